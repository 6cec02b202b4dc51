//! Messaging trait.

use crate::error::Result;
use crate::{BotIdentity, RawMessage, SocketEvent};

use futures::Stream;
use std::pin::Pin;

/// Transport event stream type.
pub type EventStream = Pin<Box<dyn Stream<Item = SocketEvent> + Send>>;

/// A chat platform the bot is connected to.
pub trait Messaging: Send + Sync + 'static {
    /// Authenticate and report who the bot is on this platform.
    fn identify(&self) -> impl std::future::Future<Output = Result<BotIdentity>> + Send;

    /// Open the event connection and return the stream of transport events.
    fn start(&self) -> impl std::future::Future<Output = Result<EventStream>> + Send;

    /// Fetch recent history for a channel, newest first.
    ///
    /// `anchor_ts` identifies the conversation the caller is interested in.
    /// Adapters may return the whole channel or only that thread.
    fn fetch_history(
        &self,
        channel_id: &str,
        anchor_ts: &str,
    ) -> impl std::future::Future<Output = Result<Vec<RawMessage>>> + Send;

    /// Post a plain text message into a channel.
    fn post_message(
        &self,
        channel_id: &str,
        text: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Graceful shutdown.
    fn shutdown(&self) -> impl std::future::Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}
