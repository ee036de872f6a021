//! Execution result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::compliance::ComplianceResult;

/// Outcome of a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Passed,
    Failed,
    TimedOut,
}

/// Result of a stage execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: String,
    pub status: StageStatus,
    /// `None` when the process never started or was killed by a signal
    pub exit_code: Option<i32>,
    /// Tail of combined stdout/stderr
    pub output: String,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StageResult {
    pub fn success(&self) -> bool {
        self.status == StageStatus::Passed
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Short reason used in abort records and notifications
    pub fn failure_reason(&self) -> String {
        if let Some(error) = &self.error {
            return error.clone();
        }
        match (self.status, self.exit_code) {
            (StageStatus::Passed, _) => "passed".to_string(),
            (_, Some(code)) => format!("exit code {}", code),
            (_, None) => "terminated without exit code".to_string(),
        }
    }
}

/// Terminal state of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Aborted { stage: String, reason: String },
}

/// What happened to the end-of-run notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum NotificationOutcome {
    Delivered,
    /// No webhook configured; the summary was only logged
    Skipped,
    Failed(String),
}

/// Result of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub pipeline: String,
    pub status: RunStatus,
    pub results: Vec<StageResult>,
    pub compliance: Option<ComplianceResult>,
    pub notification: NotificationOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn is_aborted(&self) -> bool {
        matches!(self.status, RunStatus::Aborted { .. })
    }

    /// Name of the stage that aborted the run
    pub fn aborted_at(&self) -> Option<&str> {
        match &self.status {
            RunStatus::Aborted { stage, .. } => Some(stage),
            RunStatus::Completed => None,
        }
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.passed_count()
    }

    pub fn result(&self, stage: &str) -> Option<&StageResult> {
        self.results.iter().find(|r| r.stage == stage)
    }
}

/// Keep the last `limit` bytes of `text`, on a char boundary
pub fn excerpt(text: &str, limit: usize) -> String {
    let text = text.trim_end();
    if text.len() <= limit {
        return text.to_string();
    }
    let mut start = text.len() - limit;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...[truncated]\n{}", &text[start..])
}
