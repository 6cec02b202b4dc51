//! The event loop: consumes transport events and dispatches mentions.

use crate::agent::mention::MentionHandler;
use crate::llm::CompletionModel;
use crate::messaging::{EventStream, Messaging};
use crate::{EventsApiEnvelope, InnerEvent, SocketEvent};

use futures::StreamExt as _;
use std::sync::Arc;

/// Consume events until the stream ends.
///
/// Envelopes are acknowledged as soon as they arrive. Each mention is handled
/// on its own task; the loop never waits for one to finish.
pub async fn run<M, C>(mut events: EventStream, handler: Arc<MentionHandler<M, C>>)
where
    M: Messaging,
    C: CompletionModel,
{
    while let Some(event) = events.next().await {
        match event {
            SocketEvent::Connecting => {
                tracing::info!("connecting to slack with socket mode");
            }
            SocketEvent::Connected => {
                tracing::info!("connected to slack with socket mode");
            }
            SocketEvent::ConnectionError(reason) => {
                tracing::warn!(%reason, "socket mode connection failed, retrying later");
            }
            SocketEvent::EventsApi(envelope) => dispatch(envelope, &handler),
        }
    }

    tracing::info!("event stream closed");
}

fn dispatch<M, C>(envelope: EventsApiEnvelope, handler: &Arc<MentionHandler<M, C>>)
where
    M: Messaging,
    C: CompletionModel,
{
    let EventsApiEnvelope { ack, event } = envelope;
    ack.ack();

    match event {
        InnerEvent::AppMention(mention) => {
            tracing::info!(
                channel_id = %mention.channel,
                user_id = %mention.user,
                ts = %mention.ts,
                "mention received"
            );
            let handler = handler.clone();
            tokio::spawn(async move {
                handler.handle(&mention).await;
            });
        }
        InnerEvent::MemberJoinedChannel { user, channel } => {
            tracing::info!(user_id = %user, channel_id = %channel, "user joined channel");
        }
        InnerEvent::Other(kind) => {
            tracing::debug!(%kind, "ignoring unsupported events api event");
        }
    }
}
