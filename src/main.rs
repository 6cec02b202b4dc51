//! Mentionbot CLI entry point.

use mentionbot::agent::{MentionHandler, event_loop};
use mentionbot::config::{Config, RuntimeConfig};
use mentionbot::llm::HttpCompletionClient;
use mentionbot::messaging::{Messaging as _, SlackAdapter};

use anyhow::Context as _;
use clap::Parser;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mentionbot")]
#[command(about = "Answers Slack mentions using a text-completion backend")]
struct Cli {
    /// Path to a TOML config file (optional; environment variables win)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    let _log_guard = mentionbot::logging::init_tracing(cli.debug, config.log_dir.as_deref())?;

    let slack = Arc::new(SlackAdapter::new(&config.slack)?);
    let identity = slack
        .identify()
        .await
        .context("slack authentication failed")?;

    let runtime = Arc::new(RuntimeConfig::new(&config, identity));
    let completion = Arc::new(HttpCompletionClient::new(&config.completion)?);
    tracing::info!(
        completion_url = %completion.endpoint(),
        budget = runtime.budget,
        history_scope = ?config.slack.history_scope,
        "starting mentionbot"
    );
    let handler = Arc::new(MentionHandler::new(slack.clone(), completion, runtime));

    let events = slack
        .start()
        .await
        .context("failed to start slack socket mode")?;

    tokio::select! {
        _ = event_loop::run(events, handler) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    slack.shutdown().await?;
    tracing::info!("mentionbot stopped");
    Ok(())
}
