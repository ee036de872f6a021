//! End-of-run notification
//!
//! Every run produces exactly one [`RunSummary`]. It is handed to a
//! [`Notifier`]; the stock implementation POSTs `{"text": ...}` to a
//! webhook with reqwest. Delivery failures are reported back to the
//! orchestrator, which logs them and records them on the run without
//! touching the run's status.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::compliance::Classification;
use super::result::{PipelineRun, RunStatus};
use crate::workflow::{WebhookConfig, WebhookRetryConfig};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },
}

impl NotifyError {
    fn is_retryable(&self) -> bool {
        match self {
            NotifyError::Request(e) => e.is_connect() || e.is_timeout(),
            NotifyError::HttpError { status, .. } => *status == 429 || *status >= 500,
            NotifyError::ClientBuild(_) => false,
        }
    }
}

/// Summary emitted once per run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub pipeline: String,
    pub aborted: bool,
    pub aborted_at: Option<String>,
    pub compliance: Option<Classification>,
    pub text: String,
}

impl RunSummary {
    pub fn from_run(run: &PipelineRun) -> Self {
        let mut text = match &run.status {
            RunStatus::Completed => format!(
                "Pipeline '{}' completed: {}/{} stages passed",
                run.pipeline,
                run.passed_count(),
                run.results.len()
            ),
            RunStatus::Aborted { stage, reason } => {
                format!("Pipeline '{}' aborted at {}: {}", run.pipeline, stage, reason)
            }
        };

        let compliance = run.compliance.as_ref().map(|c| c.classification);
        if let Some(classification) = compliance {
            text.push_str(&format!(". Compliance: {}", classification));
        }

        Self {
            run_id: run.run_id.clone(),
            pipeline: run.pipeline.clone(),
            aborted: run.is_aborted(),
            aborted_at: run.aborted_at().map(String::from),
            compliance,
            text,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, summary: &RunSummary) -> Result<(), NotifyError>;
}

/// Posts the summary text to a webhook (Slack-compatible body)
#[derive(Debug)]
pub struct WebhookNotifier {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout))
            .build()
            .map_err(|e| NotifyError::ClientBuild(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn from_config(config: &WebhookConfig) -> Result<Self, NotifyError> {
        Self::new(config.clone())
    }

    fn retry_delay(retry: &WebhookRetryConfig, attempt: u32) -> Duration {
        let delay = retry
            .initial_delay
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        Duration::from_millis(delay.min(retry.max_delay))
    }

    async fn post_once(&self, summary: &RunSummary) -> Result<(), NotifyError> {
        let body = serde_json::json!({ "text": summary.text });

        debug!("POST {}", self.config.url);
        let response = self.client.post(&self.config.url).json(&body).send().await?;

        let status = response.status();
        if status.is_success() {
            info!("Notification delivered ({})", status.as_u16());
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(NotifyError::HttpError {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, summary: &RunSummary) -> Result<(), NotifyError> {
        let max_attempts = self
            .config
            .retry
            .as_ref()
            .map(|r| r.max_attempts.max(1))
            .unwrap_or(1);

        let mut attempt = 0;
        loop {
            if attempt > 0 {
                if let Some(retry) = &self.config.retry {
                    let delay = Self::retry_delay(retry, attempt);
                    warn!(
                        "Retrying notification (attempt {}/{}) after {:?}",
                        attempt + 1,
                        max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }

            match self.post_once(summary).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    warn!("Notification attempt failed: {}", e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
