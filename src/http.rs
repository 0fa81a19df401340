//! JSON-over-HTTP calls with retry and exponential backoff.
//!
//! Shared by the remote embedding and language-model clients:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use std::time::Duration;

/// One JSON POST endpoint of a remote service.
pub struct JsonEndpoint<'a> {
    pub client: &'a reqwest::Client,
    pub url: String,
    pub bearer: Option<&'a str>,
    /// Service name used in error messages (e.g. `"OpenAI"`).
    pub service: &'a str,
    pub max_retries: u32,
}

impl JsonEndpoint<'_> {
    /// POST `body` and return the decoded response, retrying transient failures.
    pub async fn post(&self, body: &serde_json::Value) -> Result<serde_json::Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(service = self.service, attempt, ?delay, "retrying request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(&self.url)
                .header("Content-Type", "application/json")
                .json(body);
            if let Some(key) = self.bearer {
                request = request.header("Authorization", format!("Bearer {}", key));
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!(
                            "{} API error {}: {}",
                            self.service,
                            status,
                            body_text
                        ));
                        continue;
                    }

                    bail!("{} API error {}: {}", self.service, status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow!(
                        "{} connection error (is it reachable at {}?): {}",
                        self.service,
                        self.url,
                        e
                    ));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| anyhow!("{} request failed after retries", self.service)))
    }
}

/// Build a client with a per-request timeout.
pub fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}
