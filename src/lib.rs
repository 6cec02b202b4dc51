//! Mentionbot: answers Slack @-mentions by forwarding the recent conversation
//! to a text-completion backend.

pub mod agent;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod logging;
pub mod messaging;

pub use error::{Error, Result};

use tokio::sync::oneshot;

/// The bot's own identity, resolved once at startup via `auth.test`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    /// Bot id (`B...`). Slack omits it for some token types.
    pub bot_id: Option<String>,
    /// User id of the bot user (`U...`).
    pub user_id: String,
}

impl BotIdentity {
    /// True when the mention was produced by this bot.
    pub fn is_self(&self, mention: &MentionEvent) -> bool {
        same_id(self.bot_id.as_deref(), mention.bot_id.as_deref())
            || (!mention.user.is_empty() && mention.user == self.user_id)
    }

    /// True when a history message was written by this bot.
    pub fn authored(&self, message: &RawMessage) -> bool {
        same_id(self.bot_id.as_deref(), message.bot_id.as_deref())
    }
}

/// Two ids match only when both are present and non-empty.
fn same_id(ours: Option<&str>, theirs: Option<&str>) -> bool {
    match (ours, theirs) {
        (Some(ours), Some(theirs)) => !ours.is_empty() && ours == theirs,
        _ => false,
    }
}

/// A message record as returned by the platform's history API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMessage {
    pub user: Option<String>,
    pub bot_id: Option<String>,
    pub text: String,
    pub ts: String,
    pub thread_ts: Option<String>,
}

/// An `app_mention` event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionEvent {
    pub bot_id: Option<String>,
    pub user: String,
    pub channel: String,
    pub ts: String,
    pub thread_ts: Option<String>,
}

impl MentionEvent {
    /// Timestamp identifying the conversation: the thread root if the mention
    /// was posted in a thread, otherwise the mention itself.
    pub fn thread_anchor(&self) -> &str {
        self.thread_ts
            .as_deref()
            .filter(|ts| !ts.is_empty())
            .unwrap_or(&self.ts)
    }
}

/// Payload of an Events API envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InnerEvent {
    AppMention(MentionEvent),
    MemberJoinedChannel { user: String, channel: String },
    /// Any other event type, by its Slack type name.
    Other(String),
}

/// Acknowledgement handle carried by every Events API envelope.
///
/// The transport holds the receiving half and confirms delivery to Slack once
/// the token fires. Dropping the token without calling [`AckToken::ack`] leaves
/// the transport to time out on its own.
#[derive(Debug)]
pub struct AckToken(Option<oneshot::Sender<()>>);

impl AckToken {
    pub fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self(Some(tx)), rx)
    }

    /// A token nobody is waiting on.
    pub fn detached() -> Self {
        Self(None)
    }

    pub fn ack(mut self) {
        if let Some(tx) = self.0.take() {
            // The transport may have stopped waiting already.
            let _ = tx.send(());
        }
    }
}

/// An Events API envelope together with its acknowledgement handle.
#[derive(Debug)]
pub struct EventsApiEnvelope {
    pub ack: AckToken,
    pub event: InnerEvent,
}

/// Events produced by the socket mode transport.
#[derive(Debug)]
pub enum SocketEvent {
    Connecting,
    Connected,
    ConnectionError(String),
    EventsApi(EventsApiEnvelope),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> BotIdentity {
        BotIdentity {
            bot_id: Some("B01".into()),
            user_id: "U01".into(),
        }
    }

    #[test]
    fn thread_anchor_prefers_thread_ts() {
        let mention = MentionEvent {
            ts: "200.0".into(),
            thread_ts: Some("100.0".into()),
            ..Default::default()
        };
        assert_eq!(mention.thread_anchor(), "100.0");
    }

    #[test]
    fn thread_anchor_falls_back_to_own_ts() {
        let top_level = MentionEvent {
            ts: "200.0".into(),
            ..Default::default()
        };
        assert_eq!(top_level.thread_anchor(), "200.0");

        let blank_thread = MentionEvent {
            ts: "200.0".into(),
            thread_ts: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(blank_thread.thread_anchor(), "200.0");
    }

    #[test]
    fn detects_own_mentions_by_bot_or_user_id() {
        let by_bot = MentionEvent {
            bot_id: Some("B01".into()),
            user: "U99".into(),
            ..Default::default()
        };
        let by_user = MentionEvent {
            user: "U01".into(),
            ..Default::default()
        };
        let other = MentionEvent {
            bot_id: Some("B02".into()),
            user: "U02".into(),
            ..Default::default()
        };

        assert!(identity().is_self(&by_bot));
        assert!(identity().is_self(&by_user));
        assert!(!identity().is_self(&other));
    }

    #[test]
    fn missing_bot_ids_never_match() {
        let identity = BotIdentity {
            bot_id: None,
            user_id: "U01".into(),
        };
        let message = RawMessage {
            user: Some("U02".into()),
            text: "hi".into(),
            ..Default::default()
        };
        assert!(!identity.authored(&message));

        let blank = BotIdentity {
            bot_id: Some(String::new()),
            user_id: "U01".into(),
        };
        let blank_message = RawMessage {
            bot_id: Some(String::new()),
            ..message
        };
        assert!(!blank.authored(&blank_message));
    }

    #[test]
    fn ack_token_notifies_receiver() {
        let (token, mut rx) = AckToken::new();
        token.ack();
        assert!(rx.try_recv().is_ok());

        // No receiver, no panic.
        AckToken::detached().ack();
    }
}
