//! Mention orchestration and the event loop that drives it.

pub mod event_loop;
pub mod mention;

pub use mention::{MentionHandler, MentionOutcome};
