//! HTTP completion backend client.

use crate::config::CompletionConfig;
use crate::conversation::Prompt;
use crate::error::{ChatError, ConfigError, Result};
use crate::llm::CompletionModel;

use anyhow::Context as _;

/// Posts the rendered prompt as a form field and reads the reply body.
///
/// Wire format: `POST <url>` with `Content-Type:
/// application/x-www-form-urlencoded` and a single `message` field holding the
/// newline-joined utterances. The response body is the completion text.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    endpoint: reqwest::Url,
    /// HTTP client for making requests. Carries the request deadline.
    http_client: reqwest::Client,
}

impl HttpCompletionClient {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let endpoint = reqwest::Url::parse(&config.url).map_err(|error| {
            ConfigError::Invalid(format!("invalid completion url '{}': {error}", config.url))
        })?;
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            endpoint,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }
}

impl CompletionModel for HttpCompletionClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let message = prompt.render();

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .form(&[("message", message.as_str())])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("completion request to {} failed", self.endpoint))
            .map_err(ChatError::CompletionUnavailable)?;

        let body = response
            .bytes()
            .await
            .context("failed to read completion response body")
            .map_err(ChatError::CompletionUnavailable)?;

        tracing::debug!(
            endpoint = %self.endpoint,
            bytes = body.len(),
            "completion received"
        );

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
