//! Completion backend access.

pub mod completion;

pub use completion::HttpCompletionClient;

use crate::conversation::Prompt;
use crate::error::Result;

/// Something that turns a prompt into a completion.
pub trait CompletionModel: Send + Sync + 'static {
    /// Submit the prompt and return the backend's answer verbatim.
    ///
    /// A single attempt: no retries and no caching.
    fn complete(&self, prompt: &Prompt) -> impl std::future::Future<Output = Result<String>> + Send;
}
