//! Messaging platform adapters.

pub mod slack;
pub mod traits;

pub use slack::SlackAdapter;
pub use traits::{EventStream, Messaging};
