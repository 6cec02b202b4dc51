//! In-memory stand-ins for the chat platform and the completion backend.

#![allow(dead_code)]

use mentionbot::config::RuntimeConfig;
use mentionbot::conversation::{Prompt, PromptFraming};
use mentionbot::llm::CompletionModel;
use mentionbot::messaging::{EventStream, Messaging};
use mentionbot::{BotIdentity, MentionEvent, RawMessage};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tracing_subscriber::fmt::MakeWriter;

pub const BOT_ID: &str = "B0BOT";
pub const BOT_USER_ID: &str = "U0BOT";

pub fn identity() -> BotIdentity {
    BotIdentity {
        bot_id: Some(BOT_ID.into()),
        user_id: BOT_USER_ID.into(),
    }
}

pub fn runtime(budget: usize) -> Arc<RuntimeConfig> {
    Arc::new(RuntimeConfig {
        identity: identity(),
        framing: PromptFraming::from_system_messages("be helpful", ""),
        budget,
    })
}

pub fn user_message(user: &str, text: &str) -> RawMessage {
    RawMessage {
        user: Some(user.into()),
        text: text.into(),
        ..Default::default()
    }
}

pub fn bot_message(text: &str) -> RawMessage {
    RawMessage {
        user: Some(BOT_USER_ID.into()),
        bot_id: Some(BOT_ID.into()),
        text: text.into(),
        ..Default::default()
    }
}

pub fn mention(channel: &str, user: &str, ts: &str) -> MentionEvent {
    MentionEvent {
        bot_id: None,
        user: user.into(),
        channel: channel.into(),
        ts: ts.into(),
        thread_ts: None,
    }
}

/// Chat platform double. Histories are stored newest-first, like Slack's.
pub struct FakeSlack {
    histories: HashMap<String, Vec<RawMessage>>,
    history_error: Option<String>,
    fail_posts: bool,
    pub fetches: Mutex<Vec<(String, String)>>,
    pub posts: Mutex<Vec<(String, String)>>,
    posted_tx: mpsc::UnboundedSender<(String, String)>,
}

impl FakeSlack {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, String)>) {
        let (posted_tx, posted_rx) = mpsc::unbounded_channel();
        let fake = Self {
            histories: HashMap::new(),
            history_error: None,
            fail_posts: false,
            fetches: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
            posted_tx,
        };
        (fake, posted_rx)
    }

    pub fn with_history(mut self, channel: &str, newest_first: Vec<RawMessage>) -> Self {
        self.histories.insert(channel.into(), newest_first);
        self
    }

    pub fn with_history_error(mut self, reason: &str) -> Self {
        self.history_error = Some(reason.into());
        self
    }

    pub fn with_failing_posts(mut self) -> Self {
        self.fail_posts = true;
        self
    }

    pub fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().clone()
    }

    pub fn fetches(&self) -> Vec<(String, String)> {
        self.fetches.lock().clone()
    }
}

impl Messaging for FakeSlack {
    async fn identify(&self) -> mentionbot::Result<BotIdentity> {
        Ok(identity())
    }

    async fn start(&self) -> mentionbot::Result<EventStream> {
        Ok(Box::pin(futures::stream::empty()))
    }

    async fn fetch_history(
        &self,
        channel_id: &str,
        anchor_ts: &str,
    ) -> mentionbot::Result<Vec<RawMessage>> {
        self.fetches
            .lock()
            .push((channel_id.to_string(), anchor_ts.to_string()));
        if let Some(reason) = &self.history_error {
            return Err(anyhow::anyhow!("{reason}").into());
        }
        Ok(self.histories.get(channel_id).cloned().unwrap_or_default())
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> mentionbot::Result<()> {
        let post = (channel_id.to_string(), text.to_string());
        self.posts.lock().push(post.clone());
        let _ = self.posted_tx.send(post);
        if self.fail_posts {
            return Err(anyhow::anyhow!("channel_not_found").into());
        }
        Ok(())
    }
}

/// What the completion double answers with.
pub enum Reply {
    Fixed(String),
    /// Answer with the rendered prompt itself.
    Echo,
    Fail(String),
}

/// Completion backend double that records every prompt it receives.
pub struct FakeCompletion {
    reply: Reply,
    /// Sleep before answering when the rendered prompt contains the key.
    delays: Vec<(String, Duration)>,
    /// When set, every call waits for a notification before answering.
    gate: Option<Arc<Notify>>,
    pub prompts: Mutex<Vec<Prompt>>,
}

impl FakeCompletion {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            delays: Vec::new(),
            gate: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, key: &str, delay: Duration) -> Self {
        self.delays.push((key.into(), delay));
        self
    }

    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().clone()
    }
}

impl CompletionModel for FakeCompletion {
    async fn complete(&self, prompt: &Prompt) -> mentionbot::Result<String> {
        self.prompts.lock().push(prompt.clone());
        let rendered = prompt.render();

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        for (key, delay) in &self.delays {
            if rendered.contains(key.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }

        match &self.reply {
            Reply::Fixed(text) => Ok(text.clone()),
            Reply::Echo => Ok(rendered),
            Reply::Fail(reason) => Err(mentionbot::error::ChatError::CompletionUnavailable(
                anyhow::anyhow!("{reason}"),
            )
            .into()),
        }
    }
}

/// Wait for the next post, failing the test if none arrives in time.
pub async fn next_post(rx: &mut mpsc::UnboundedReceiver<(String, String)>) -> (String, String) {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a post")
        .expect("post channel closed")
}

/// In-memory log sink for a scoped `tracing` subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Route events on the current thread here until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
