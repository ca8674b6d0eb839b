//! Webhook delivery with exponential-backoff retry.
//!
//! [`WebhookDelivery`] sends a JSON-encoded [`JobOutcome`] to an external
//! URL via HTTP POST. Failed attempts are retried with exponential
//! backoff (1 s, 2 s, 4 s by default).

use std::time::Duration;

use serde::Serialize;

/// Default retry delays (exponential backoff: 1s, 2s, 4s).
const DEFAULT_RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Summary payload POSTed to a job's webhook URL on a terminal outcome.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    /// Job identifier.
    pub id: String,
    /// Terminal status, e.g. `"completed"`.
    pub status: String,
    /// Output filenames (empty unless completed).
    pub files: Vec<String>,
    /// Failure description, if any.
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// WebhookDelivery
// ---------------------------------------------------------------------------

/// Delivers job outcome summaries to external webhook endpoints.
pub struct WebhookDelivery {
    client: reqwest::Client,
    retry_delays: Vec<Duration>,
}

impl WebhookDelivery {
    /// Create a delivery service with the default retry schedule.
    pub fn new() -> Self {
        Self::with_retry_delays(DEFAULT_RETRY_DELAYS.to_vec())
    }

    /// Create a delivery service with a custom retry schedule.
    ///
    /// One final attempt always runs after the last delay; an empty
    /// schedule means a single attempt with no retry.
    pub fn with_retry_delays(retry_delays: Vec<Duration>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            retry_delays,
        }
    }

    /// Deliver an outcome payload to a webhook URL with retry.
    ///
    /// Returns `Ok(())` on the first successful attempt.
    pub async fn deliver(&self, url: &str, outcome: &JobOutcome) -> Result<(), WebhookError> {
        let mut last_err: Option<WebhookError> = None;

        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(url, outcome).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url,
                        error = %e,
                        "Webhook delivery attempt failed, retrying"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        // Final attempt after the last backoff.
        match self.try_send(url, outcome).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(url, error = %e, "Webhook delivery failed after all retries");
                Err(last_err.unwrap_or(e))
            }
        }
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(&self, url: &str, outcome: &JobOutcome) -> Result<(), WebhookError> {
        let response = self.client.post(url).json(outcome).send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

impl Default for WebhookDelivery {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
