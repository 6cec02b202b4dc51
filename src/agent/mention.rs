//! Mention handler: history → window → prompt → completion → reply.

use crate::MentionEvent;
use crate::config::RuntimeConfig;
use crate::conversation::{self, Prompt};
use crate::error::{ChatError, Error, Result};
use crate::llm::CompletionModel;
use crate::messaging::Messaging;

use rand::Rng as _;
use rand::distr::Alphanumeric;
use std::sync::Arc;

/// Length of the trace id shown to users when a request fails.
pub const TRACE_ID_LEN: usize = 6;

/// The reply posted when anything in the pipeline fails. Never includes the
/// underlying error; the trace id links it to the log line that does.
pub fn apology_message(trace_id: &str) -> String {
    format!("Sorry, something went wrong. Please try again later. (trace id: {trace_id})")
}

/// Short random token correlating a user-visible failure with the log.
pub fn generate_trace_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TRACE_ID_LEN)
        .map(char::from)
        .collect()
}

/// Slack refuses to post a message without visible text.
fn reject_blank(completion: String) -> Result<String> {
    if completion.trim().is_empty() {
        return Err(ChatError::CompletionUnavailable(anyhow::anyhow!(
            "backend returned an empty completion"
        ))
        .into());
    }
    Ok(completion)
}

/// What happened to one mention.
#[derive(Debug)]
pub enum MentionOutcome {
    /// The bot mentioned itself; nothing was done.
    Ignored,
    /// The completion was posted.
    Replied,
    /// The completion was produced but posting it failed.
    Undelivered { error: Error },
    /// The pipeline failed and an apology with `trace_id` was posted
    /// (or attempted).
    Failed { trace_id: String, error: Error },
}

/// Answers mentions. Holds no per-conversation state, so one instance serves
/// every concurrent mention.
pub struct MentionHandler<M, C> {
    messaging: Arc<M>,
    completion: Arc<C>,
    runtime: Arc<RuntimeConfig>,
}

impl<M, C> MentionHandler<M, C>
where
    M: Messaging,
    C: CompletionModel,
{
    pub fn new(messaging: Arc<M>, completion: Arc<C>, runtime: Arc<RuntimeConfig>) -> Self {
        Self {
            messaging,
            completion,
            runtime,
        }
    }

    /// Run the full pipeline for one mention and deliver the result.
    pub async fn handle(&self, mention: &MentionEvent) -> MentionOutcome {
        if self.runtime.identity.is_self(mention) {
            tracing::debug!(
                channel_id = %mention.channel,
                user_id = %mention.user,
                "ignoring self mention"
            );
            return MentionOutcome::Ignored;
        }

        let channel_id = mention.channel.as_str();
        let anchor_ts = mention.thread_anchor();

        let result = match self.build_prompt(channel_id, anchor_ts).await {
            Ok(prompt) => self.completion.complete(&prompt).await.and_then(reject_blank),
            Err(error) => Err(error),
        };

        match result {
            Ok(completion) => match self.post(channel_id, &completion).await {
                Ok(()) => {
                    tracing::info!(
                        channel_id,
                        anchor_ts,
                        chars = completion.chars().count(),
                        "replied to mention"
                    );
                    MentionOutcome::Replied
                }
                Err(error) => {
                    tracing::error!(%error, channel_id, "failed to post completion");
                    MentionOutcome::Undelivered { error }
                }
            },
            Err(error) => {
                let trace_id = generate_trace_id();
                tracing::error!(
                    %trace_id,
                    %error,
                    channel_id,
                    anchor_ts,
                    "failed to answer mention"
                );
                if let Err(post_error) = self.post(channel_id, &apology_message(&trace_id)).await {
                    tracing::error!(%trace_id, error = %post_error, channel_id, "failed to post apology");
                }
                MentionOutcome::Failed { trace_id, error }
            }
        }
    }

    /// Fetch, normalize, truncate and frame the conversation.
    async fn build_prompt(&self, channel_id: &str, anchor_ts: &str) -> Result<Prompt> {
        let history = self
            .messaging
            .fetch_history(channel_id, anchor_ts)
            .await
            .map_err(|error| ChatError::HistoryUnavailable {
                channel_id: channel_id.to_string(),
                source: error.into(),
            })?;
        if history.is_empty() {
            return Err(ChatError::HistoryUnavailable {
                channel_id: channel_id.to_string(),
                source: anyhow::anyhow!("no messages returned"),
            }
            .into());
        }

        let fetched = history.len();
        let window = conversation::normalize(history, &self.runtime.identity);
        let normalized = window.len();
        let window = conversation::truncate_to_budget(window, self.runtime.budget);
        let prompt = conversation::assemble(&self.runtime.framing, window);

        tracing::debug!(
            channel_id,
            fetched,
            normalized,
            utterances = prompt.len(),
            prompt = %prompt.render(),
            "prompt assembled"
        );

        Ok(prompt)
    }

    async fn post(&self, channel_id: &str, text: &str) -> Result<()> {
        self.messaging
            .post_message(channel_id, text)
            .await
            .map_err(|error| {
                ChatError::PostFailed {
                    channel_id: channel_id.to_string(),
                    source: error.into(),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_ids_are_short_and_alphanumeric() {
        for _ in 0..100 {
            let trace_id = generate_trace_id();
            assert_eq!(trace_id.len(), TRACE_ID_LEN);
            assert!(trace_id.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn trace_ids_vary() {
        let first = generate_trace_id();
        let differs = (0..20).any(|_| generate_trace_id() != first);
        assert!(differs);
    }

    #[test]
    fn apology_embeds_trace_id_only() {
        assert_eq!(
            apology_message("aB3xY9"),
            "Sorry, something went wrong. Please try again later. (trace id: aB3xY9)"
        );
    }

    #[test]
    fn blank_completions_are_rejected() {
        assert!(matches!(
            reject_blank("  \n\t".into()),
            Err(Error::Chat(ChatError::CompletionUnavailable(_)))
        ));
        assert_eq!(reject_blank(" ok\n".into()).ok().as_deref(), Some(" ok\n"));
    }
}
