//! Polls the document status endpoint until a terminal outcome.
//!
//! Three ways out, kept distinct for the caller: the server reports a
//! terminal status (`Completed`/`Failed`), the wall-clock timeout expires
//! (`PollError::TimedOut` — the server may still be working), or the caller
//! cancels (`Outcome::Cancelled` — not an error). Cancellation stops polling
//! only; the in-request server job keeps running.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(240);
// Caps a single status request so a hung connection cannot hold the loop
// past the wall-clock deadline; a hit counts as one transport failure.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("status request failed {attempts} times in a row: {last}")]
    Transport { attempts: u32, last: String },

    #[error("polling timed out after {0:?}")]
    TimedOut(Duration),
}

/// Terminal polling outcomes. A server-reported failure is an outcome, not
/// an error: the poll itself worked.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(StatusView),
    Failed(StatusView),
    Cancelled,
}

/// The slice of the status response the poller cares about.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusView {
    pub status: String,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub current_phase: Option<String>,
    #[serde(default)]
    pub current_message: Option<String>,
    #[serde(default)]
    pub thought_process: Option<String>,
}

pub struct StatusPoller {
    client: Client,
    base_url: String,
    user_id: String,
    interval: Duration,
    timeout: Duration,
    request_timeout: Duration,
}

impl StatusPoller {
    pub fn new(base_url: String, user_id: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            user_id,
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub async fn poll_document(
        &self,
        document_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Outcome, PollError> {
        let url = format!("{}/documents/{}/status", self.base_url, document_id);
        self.poll(&url, cancel).await
    }

    async fn poll(&self, url: &str, cancel: &CancellationToken) -> Result<Outcome, PollError> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut consecutive_failures = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Ok(Outcome::Cancelled);
            }

            match self.fetch(url).await {
                Ok(view) => {
                    consecutive_failures = 0;
                    match view.status.as_str() {
                        "completed" => return Ok(Outcome::Completed(view)),
                        "failed" => return Ok(Outcome::Failed(view)),
                        _ => {}
                    }
                }
                Err(last) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        url = %url,
                        attempt = consecutive_failures,
                        error = %last,
                        "Status poll attempt failed"
                    );
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        return Err(PollError::Transport {
                            attempts: consecutive_failures,
                            last,
                        });
                    }
                }
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(PollError::TimedOut(self.timeout));
            }
            let wait = self.interval.min(deadline - now);

            tokio::select! {
                _ = cancel.cancelled() => return Ok(Outcome::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<StatusView, String> {
        let response = self
            .client
            .get(url)
            .header("X-User-ID", &self.user_id)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("status endpoint returned {}", response.status()));
        }

        response.json().await.map_err(|e| e.to_string())
    }
}
