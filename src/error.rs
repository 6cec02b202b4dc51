//! Top-level error types for Mentionbot.

use std::sync::Arc;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors. These are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: Arc<std::io::Error>,
    },

    #[error("failed to parse config file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing required config key: {0}")]
    MissingKey(String),
}

/// Failures inside a single mention's pipeline.
///
/// None of these are fatal: the pipeline for that mention is aborted and the
/// user gets an apology carrying a trace id.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("history unavailable for channel {channel_id}: {source:#}")]
    HistoryUnavailable {
        channel_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("completion backend unavailable: {0:#}")]
    CompletionUnavailable(#[source] anyhow::Error),

    #[error("failed to post to channel {channel_id}: {source:#}")]
    PostFailed {
        channel_id: String,
        #[source]
        source: anyhow::Error,
    },
}
