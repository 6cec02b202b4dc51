//! Slack messaging adapter using slack-morphism.
//!
//! **Inbound**: Socket Mode push events. `app_mention` and
//! `member_joined_channel` are mapped to typed events; everything else is
//! passed through by type name. Each envelope is acknowledged once the event
//! loop fires its [`AckToken`].
//!
//! **Outbound**: plain text posts via `chat.postMessage`, split at line/word
//! boundaries when a reply exceeds Slack's message size.
//!
//! **History**: `conversations.history` for the channel, or
//! `conversations.replies` for the mention's thread.

use crate::config::{HistoryScope, SlackConfig};
use crate::messaging::traits::{EventStream, Messaging};
use crate::{
    AckToken, BotIdentity, EventsApiEnvelope, InnerEvent, MentionEvent, RawMessage, SocketEvent,
};

use anyhow::Context as _;
use slack_morphism::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};

/// Maximum characters per posted message.
const MAX_MESSAGE_LEN: usize = 12_000;

/// How long a push callback waits for the event loop to acknowledge an
/// envelope. Slack retries deliveries that are not acked within 3 seconds.
const ACK_WAIT: Duration = Duration::from_secs(2);

/// State shared with socket mode callbacks via `SlackClientEventsUserState`.
struct SlackListenerState {
    events_tx: mpsc::Sender<SocketEvent>,
}

/// Slack adapter.
pub struct SlackAdapter {
    app_token: String,
    /// Shared HTTP client for REST calls, constructed once.
    client: Arc<SlackHyperClient>,
    /// Pre-built API token wrapping the bot token.
    token: SlackApiToken,
    history_limit: u16,
    history_scope: HistoryScope,
    shutdown_tx: Arc<RwLock<Option<mpsc::Sender<()>>>>,
}

impl SlackAdapter {
    pub fn new(config: &SlackConfig) -> anyhow::Result<Self> {
        let client = Arc::new(SlackClient::new(
            SlackClientHyperConnector::new().context("failed to create slack HTTP connector")?,
        ));
        let token = SlackApiToken::new(SlackApiTokenValue(config.bot_token.clone()));
        Ok(Self {
            app_token: config.app_token.clone(),
            client,
            token,
            history_limit: config.history_limit,
            history_scope: config.history_scope,
            shutdown_tx: Arc::new(RwLock::new(None)),
        })
    }

    /// Open a session against the cached client using the cached bot token.
    fn session(&self) -> SlackClientSession<'_, SlackClientHyperHttpsConnector> {
        self.client.open_session(&self.token)
    }
}

// ---------------------------------------------------------------------------
// Inbound event handlers (slack-morphism takes fn pointers)
// ---------------------------------------------------------------------------

/// Forward a push event to the event loop and hold the socket mode ack until
/// the loop confirms receipt.
async fn handle_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> UserCallbackResult<()> {
    let events_tx = {
        let state_guard = states.read().await;
        state_guard
            .get_user_state::<Arc<SlackListenerState>>()
            .map(|state| state.events_tx.clone())
    };
    let Some(events_tx) = events_tx else {
        tracing::error!("slack listener state missing, dropping push event");
        return Ok(());
    };

    let (ack, acked) = AckToken::new();
    let envelope = EventsApiEnvelope {
        ack,
        event: inner_event(event.event),
    };

    if let Err(error) = events_tx.send(SocketEvent::EventsApi(envelope)).await {
        tracing::warn!(%error, "event loop is gone, dropping slack push event");
        return Ok(());
    }

    if tokio::time::timeout(ACK_WAIT, acked).await.is_err() {
        tracing::warn!("event loop did not acknowledge slack push event in time");
    }

    Ok(())
}

fn slack_error_handler(
    err: Box<dyn std::error::Error + Send + Sync>,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> HttpStatusCode {
    tracing::warn!(error = %err, "slack socket mode error");

    // Error handlers are synchronous; skip the report rather than block.
    if let Ok(state_guard) = states.try_read() {
        if let Some(state) = state_guard.get_user_state::<Arc<SlackListenerState>>() {
            let _ = state
                .events_tx
                .try_send(SocketEvent::ConnectionError(err.to_string()));
        }
    }

    HttpStatusCode::OK
}

/// Map a Slack event callback body onto the events the bot cares about.
fn inner_event(body: SlackEventCallbackBody) -> InnerEvent {
    match body {
        // `SlackAppMentionEvent` has flat `user` and `channel` fields and does
        // not carry the author's bot id.
        SlackEventCallbackBody::AppMention(mention) => InnerEvent::AppMention(MentionEvent {
            bot_id: None,
            user: mention.user.0,
            channel: mention.channel.0,
            ts: mention.origin.ts.0,
            thread_ts: mention.origin.thread_ts.map(|ts| ts.0),
        }),
        SlackEventCallbackBody::MemberJoinedChannel(joined) => InnerEvent::MemberJoinedChannel {
            user: joined.user.0,
            channel: joined.channel.0,
        },
        other => InnerEvent::Other(event_type_name(&other)),
    }
}

/// The Slack `type` tag of an event body, e.g. `"reaction_added"`.
fn event_type_name(body: &SlackEventCallbackBody) -> String {
    serde_json::to_value(body)
        .ok()
        .and_then(|value| {
            value
                .get("type")
                .and_then(|kind| kind.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown".into())
}

fn raw_message(message: SlackHistoryMessage) -> RawMessage {
    RawMessage {
        user: message.sender.user.map(|user| user.0),
        bot_id: message.sender.bot_id.map(|bot| bot.0),
        text: message.content.text.unwrap_or_default(),
        ts: message.origin.ts.0,
        thread_ts: message.origin.thread_ts.map(|ts| ts.0),
    }
}

// ---------------------------------------------------------------------------
// Messaging trait impl
// ---------------------------------------------------------------------------

impl Messaging for SlackAdapter {
    async fn identify(&self) -> crate::Result<BotIdentity> {
        let auth_response = self
            .session()
            .auth_test()
            .await
            .context("failed to call auth.test")?;

        let identity = BotIdentity {
            bot_id: auth_response.bot_id.map(|bot| bot.0),
            user_id: auth_response.user_id.0,
        };
        tracing::info!(
            bot_id = identity.bot_id.as_deref().unwrap_or("-"),
            bot_user_id = %identity.user_id,
            "slack bot identity resolved"
        );
        Ok(identity)
    }

    async fn start(&self) -> crate::Result<EventStream> {
        let (events_tx, events_rx) = mpsc::channel(256);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        *self.shutdown_tx.write().await = Some(shutdown_tx);

        let listener_state = Arc::new(SlackListenerState {
            events_tx: events_tx.clone(),
        });

        let callbacks = SlackSocketModeListenerCallbacks::new().with_push_events(handle_push_event);

        // The socket mode listener owns a persistent WebSocket connection and
        // gets its own client. The shared `self.client` is for REST calls.
        let listener_client = Arc::new(SlackClient::new(
            SlackClientHyperConnector::new()
                .context("failed to create slack socket mode connector")?,
        ));

        let listener_environment = Arc::new(
            SlackClientEventsListenerEnvironment::new(listener_client)
                .with_error_handler(slack_error_handler)
                .with_user_state(listener_state),
        );

        let listener = SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment,
            callbacks,
        );

        let app_token = SlackApiToken::new(SlackApiTokenValue(self.app_token.clone()));

        tokio::spawn(async move {
            let _ = events_tx.send(SocketEvent::Connecting).await;

            if let Err(error) = listener.listen_for(&app_token).await {
                tracing::error!(%error, "failed to start slack socket mode listener");
                let _ = events_tx
                    .send(SocketEvent::ConnectionError(error.to_string()))
                    .await;
                return;
            }

            let _ = events_tx.send(SocketEvent::Connected).await;
            // The listener state keeps its own sender; dropping this one lets
            // the stream end once the listener goes away.
            drop(events_tx);

            tokio::select! {
                exit_code = listener.serve() => {
                    tracing::info!(exit_code, "slack socket mode listener stopped");
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("slack socket mode shutting down");
                    listener.shutdown().await;
                }
            }
        });

        Ok(Box::pin(tokio_stream::wrappers::ReceiverStream::new(
            events_rx,
        )))
    }

    async fn fetch_history(
        &self,
        channel_id: &str,
        anchor_ts: &str,
    ) -> crate::Result<Vec<RawMessage>> {
        let session = self.session();
        let channel = SlackChannelId(channel_id.to_string());

        let messages = match self.history_scope {
            HistoryScope::Channel => {
                let req = SlackApiConversationsHistoryRequest::new()
                    .with_channel(channel)
                    .with_limit(self.history_limit);
                session
                    .conversations_history(&req)
                    .await
                    .context("failed to fetch slack channel history")?
                    .messages
            }
            HistoryScope::Thread => {
                // Replies come back oldest-first, so the newest ones are on the
                // last page. Walk every page and keep only the tail.
                let limit = usize::from(self.history_limit);
                let mut replies = Vec::new();
                let mut cursor: Option<SlackCursorId> = None;
                loop {
                    let mut req = SlackApiConversationsRepliesRequest::new(
                        channel.clone(),
                        SlackTs(anchor_ts.into()),
                    )
                    .with_limit(self.history_limit);
                    if let Some(cursor) = cursor.take() {
                        req = req.with_cursor(cursor);
                    }

                    let response = session
                        .conversations_replies(&req)
                        .await
                        .context("failed to fetch slack thread history")?;
                    append_keeping_latest(&mut replies, response.messages, limit);

                    match response
                        .response_metadata
                        .and_then(|metadata| metadata.next_cursor)
                        .filter(|next| !next.0.is_empty())
                    {
                        Some(next) => cursor = Some(next),
                        None => break,
                    }
                }
                replies.reverse();
                replies
            }
        };

        tracing::info!(
            count = messages.len(),
            channel_id = %channel_id,
            anchor_ts = %anchor_ts,
            scope = ?self.history_scope,
            "fetched slack message history"
        );

        Ok(messages.into_iter().map(raw_message).collect())
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> crate::Result<()> {
        let session = self.session();
        let channel = SlackChannelId(channel_id.to_string());

        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            let req = SlackApiChatPostMessageRequest::new(
                channel.clone(),
                SlackMessageContent::new().with_text(chunk),
            );
            session
                .chat_post_message(&req)
                .await
                .context("failed to send slack message")?;
        }

        Ok(())
    }

    async fn shutdown(&self) -> crate::Result<()> {
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(()).await;
        }
        tracing::info!("slack adapter shut down");
        Ok(())
    }
}

/// Append a page of oldest-first messages, dropping the oldest entries so at
/// most `limit` remain.
fn append_keeping_latest<T>(buffer: &mut Vec<T>, page: Vec<T>, limit: usize) {
    buffer.extend(page);
    if buffer.len() > limit {
        buffer.drain(..buffer.len() - limit);
    }
}

/// Split a message into UTF-8-safe chunks at line/word boundaries.
///
/// The separator stays at the end of its chunk, so the chunks concatenate
/// back to the input.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        // Walk back to a valid char boundary before slicing
        let mut safe_max = max_len.min(remaining.len());
        while !remaining.is_char_boundary(safe_max) {
            safe_max -= 1;
        }

        let split_at = remaining[..safe_max]
            .rfind('\n')
            .or_else(|| remaining[..safe_max].rfind(' '))
            .map(|index| index + 1)
            .unwrap_or(safe_max);

        chunks.push(remaining[..split_at].to_string());
        remaining = &remaining[split_at..];
    }

    chunks
}
