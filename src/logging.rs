//! Tracing subscriber setup.

use anyhow::Context as _;
use tracing::field::Field;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::{self, Writer};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use std::path::Path;

const MAX_MESSAGE_CHARS: usize = 280;

/// Install the global tracing subscriber.
///
/// Logs go to a daily rolling file under `log_dir` when one is given, else
/// to stdout. The returned guard flushes the file writer on drop and must be
/// held for the life of the process.
pub fn init_tracing(debug: bool, log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = build_env_filter(debug);

    match log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir).with_context(|| {
                format!("failed to create log directory: {}", log_dir.display())
            })?;
            let file_appender = tracing_appender::rolling::daily(log_dir, "mentionbot.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .fmt_fields(format::debug_fn(format_field))
                .compact();

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("failed to install tracing subscriber")?;
            Ok(Some(guard))
        }
        None => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .fmt_fields(format::debug_fn(format_field))
                .compact();

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("failed to install tracing subscriber")?;
            Ok(None)
        }
    }
}

/// `--debug` forces debug level; otherwise honour `RUST_LOG`, defaulting to info.
fn build_env_filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Keep log lines readable: long `message` fields are cut at
/// [`MAX_MESSAGE_CHARS`]. Structured fields such as `prompt` are left whole.
fn format_field(
    writer: &mut Writer<'_>,
    field: &Field,
    value: &dyn std::fmt::Debug,
) -> std::fmt::Result {
    let field_name = field.name();

    if field_name == "message" {
        let formatted = format!("{value:?}");
        let (truncated, was_truncated) = truncate_for_log(&formatted, MAX_MESSAGE_CHARS);
        if was_truncated {
            write!(writer, "{}={}...", field_name, truncated)
        } else {
            write!(writer, "{}={formatted}", field_name)
        }
    } else {
        write!(writer, "{}={value:?}", field_name)
    }
}

fn truncate_for_log(message: &str, max_chars: usize) -> (&str, bool) {
    match message.char_indices().nth(max_chars) {
        Some((byte_index, _character)) => (&message[..byte_index], true),
        None => (message, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_for_log_handles_multibyte_characters() {
        let message = "abc→def";
        let (truncated, was_truncated) = truncate_for_log(message, 4);

        assert!(was_truncated);
        assert_eq!(truncated, "abc→");
    }

    #[test]
    fn truncate_for_log_returns_original_when_within_limit() {
        let message = "hello";
        let (truncated, was_truncated) = truncate_for_log(message, 10);

        assert!(!was_truncated);
        assert_eq!(truncated, "hello");
    }

    #[test]
    fn truncate_for_log_keeps_exact_length_messages() {
        let message = "x".repeat(MAX_MESSAGE_CHARS);
        let (truncated, was_truncated) = truncate_for_log(&message, MAX_MESSAGE_CHARS);

        assert!(!was_truncated);
        assert_eq!(truncated.len(), MAX_MESSAGE_CHARS);
    }
}
