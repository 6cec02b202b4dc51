//! Configuration loading and validation.
//!
//! Values come from built-in defaults, then an optional TOML file, then the
//! process environment. Everything is read once at startup.

use crate::BotIdentity;
use crate::conversation::context::PromptFraming;
use crate::error::{ConfigError, Result};

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SYSTEM_MESSAGE: &str = "The assistant's name is Sophia.";
pub const DEFAULT_COMPLETION_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONTEXT_BUDGET: usize = 3000;
pub const DEFAULT_HISTORY_LIMIT: u16 = 100;

/// Mentionbot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub slack: SlackConfig,
    pub prompt: PromptConfig,
    pub completion: CompletionConfig,
    pub context: ContextConfig,
    /// Write logs to a daily rolling file here instead of stdout.
    pub log_dir: Option<PathBuf>,
}

/// Slack credentials and history options.
#[derive(Clone)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`), used for Web API calls.
    pub bot_token: String,
    /// App-level token (`xapp-...`), used to open the socket mode connection.
    pub app_token: String,
    /// Page size for history requests.
    pub history_limit: u16,
    pub history_scope: HistoryScope,
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"[redacted]")
            .field("app_token", &"[redacted]")
            .field("history_limit", &self.history_limit)
            .field("history_scope", &self.history_scope)
            .finish()
    }
}

/// Which messages make up a conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryScope {
    /// The channel's recent history, regardless of threads.
    #[default]
    Channel,
    /// Only the replies in the mention's thread.
    Thread,
}

impl std::str::FromStr for HistoryScope {
    type Err = ConfigError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "channel" => Ok(Self::Channel),
            "thread" => Ok(Self::Thread),
            other => Err(ConfigError::Invalid(format!(
                "unknown history scope '{other}', expected 'channel' or 'thread'"
            ))),
        }
    }
}

/// Fixed framing around every prompt.
#[derive(Debug, Clone)]
pub struct PromptConfig {
    /// Prepended as a `system` utterance.
    pub system_message: String,
    /// Appended as a `system` utterance. Empty means no postlude.
    pub system_message_post: String,
}

/// Completion backend settings.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub url: String,
    pub timeout: Duration,
}

/// Context window settings.
#[derive(Debug, Clone, Copy)]
pub struct ContextConfig {
    /// Maximum cumulative rendered length of the history sent per request.
    pub budget: usize,
}

/// On-disk TOML layout. Every key is optional; the environment wins.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TomlConfig {
    slack: TomlSlackConfig,
    prompt: TomlPromptConfig,
    completion: TomlCompletionConfig,
    context: TomlContextConfig,
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TomlSlackConfig {
    bot_token: Option<String>,
    app_token: Option<String>,
    history_limit: Option<u16>,
    history_scope: Option<HistoryScope>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TomlPromptConfig {
    system_message: Option<String>,
    system_message_post: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TomlCompletionConfig {
    url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TomlContextConfig {
    budget: Option<usize>,
}

impl Config {
    /// Load configuration from the environment and an optional TOML file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => Some(read_toml(path)?),
            None => None,
        };
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    fn from_sources(
        file: Option<TomlConfig>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let file = file.unwrap_or_default();

        let bot_token = env("BOT_TOKEN")
            .or(file.slack.bot_token)
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingKey("BOT_TOKEN".into()))?;
        let app_token = env("SLACK_APP_TOKEN")
            .or(file.slack.app_token)
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingKey("SLACK_APP_TOKEN".into()))?;

        let history_limit = match env("HISTORY_LIMIT") {
            Some(value) => parse_number("HISTORY_LIMIT", &value)?,
            None => file.slack.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
        };
        if !(1..=1000).contains(&history_limit) {
            return Err(ConfigError::Invalid(format!(
                "history limit must be between 1 and 1000, got {history_limit}"
            ))
            .into());
        }

        let history_scope = match env("HISTORY_SCOPE") {
            Some(value) => value.parse()?,
            None => file.slack.history_scope.unwrap_or_default(),
        };

        // An explicitly empty SYSTEM_MESSAGE is honoured; only an unset one
        // falls back to the default.
        let system_message = env("SYSTEM_MESSAGE")
            .or(file.prompt.system_message)
            .unwrap_or_else(|| DEFAULT_SYSTEM_MESSAGE.into());
        let system_message_post = env("SYSTEM_MESSAGE_POST")
            .or(file.prompt.system_message_post)
            .unwrap_or_default();

        let url = env("COMPLETION_URL")
            .or(file.completion.url)
            .unwrap_or_else(|| DEFAULT_COMPLETION_URL.into());
        reqwest::Url::parse(&url)
            .map_err(|error| ConfigError::Invalid(format!("invalid completion url '{url}': {error}")))?;

        let timeout_secs = match env("COMPLETION_TIMEOUT_SECS") {
            Some(value) => parse_number("COMPLETION_TIMEOUT_SECS", &value)?,
            None => file
                .completion
                .timeout_secs
                .unwrap_or(DEFAULT_COMPLETION_TIMEOUT_SECS),
        };
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid("completion timeout must be positive".into()).into());
        }

        let budget = match env("CONTEXT_BUDGET") {
            Some(value) => parse_number("CONTEXT_BUDGET", &value)?,
            None => file.context.budget.unwrap_or(DEFAULT_CONTEXT_BUDGET),
        };
        if budget == 0 {
            return Err(ConfigError::Invalid("context budget must be positive".into()).into());
        }

        let log_dir = env("LOG_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .or(file.log_dir);

        Ok(Self {
            slack: SlackConfig {
                bot_token,
                app_token,
                history_limit,
                history_scope,
            },
            prompt: PromptConfig {
                system_message,
                system_message_post,
            },
            completion: CompletionConfig {
                url,
                timeout: Duration::from_secs(timeout_secs),
            },
            context: ContextConfig { budget },
            log_dir,
        })
    }
}

fn read_toml(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Load {
        path: path.display().to_string(),
        source: Arc::new(error),
    })?;
    parse_toml(path, &content)
}

fn parse_toml(path: &Path, content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|error| {
        ConfigError::Parse {
            path: path.display().to_string(),
            reason: error.to_string(),
        }
        .into()
    })
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|error| {
        ConfigError::Invalid(format!("{key} must be a number, got '{value}': {error}")).into()
    })
}

/// Process-wide, read-only state shared by every mention handler.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub identity: BotIdentity,
    pub framing: PromptFraming,
    pub budget: usize,
}

impl RuntimeConfig {
    pub fn new(config: &Config, identity: BotIdentity) -> Self {
        Self {
            identity,
            framing: PromptFraming::from_system_messages(
                &config.prompt.system_message,
                &config.prompt.system_message_post,
            ),
            budget: config.context.budget,
        }
    }
}
