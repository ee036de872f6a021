//! Compliance classification of a scan artifact
//!
//! Two strategies:
//! - `Weak` (default): the artifact passes iff the literal marker text
//!   occurs anywhere in it. This is a plain substring check, not a parse.
//!   A marker inside an XML comment, or in a document that is not
//!   well-formed, still counts as success. That is a known limitation of
//!   the check and is kept as-is.
//! - `Strict`: the artifact passes iff it contains a complete element
//!   named after the marker (`<complianceScan ...>...</complianceScan>` or
//!   `<complianceScan/>`) outside of comments.
//!
//! A missing or unreadable artifact classifies as `Indeterminate`, which
//! counts as not passing. So does an artifact the compliance stage did not
//! write during this run: the stage never ran to an exit code, or the file
//! predates the stage. Classification never fails the orchestrator.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::engine::result::StageResult;
use crate::workflow::ComplianceMode;

static COMMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

/// Slack for filesystem timestamp granularity when comparing an artifact's
/// mtime with the stage start time
const MTIME_TOLERANCE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Success,
    Failure,
    Indeterminate,
}

impl Classification {
    pub fn is_success(self) -> bool {
        self == Classification::Success
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Classification::Success => "success",
            Classification::Failure => "failure",
            Classification::Indeterminate => "indeterminate",
        };
        f.write_str(s)
    }
}

/// Outcome of inspecting the compliance stage's artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub stage: String,
    pub artifact: PathBuf,
    pub classification: Classification,
    pub mode: ComplianceMode,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub struct ComplianceClassifier {
    marker: String,
    mode: ComplianceMode,
}

impl ComplianceClassifier {
    pub fn new(marker: impl Into<String>, mode: ComplianceMode) -> Self {
        Self {
            marker: marker.into(),
            mode,
        }
    }

    /// Classify artifact text already in memory
    pub fn classify_text(&self, text: &str) -> Classification {
        let found = match self.mode {
            ComplianceMode::Weak => text.contains(&self.marker),
            ComplianceMode::Strict => match self.element_regex() {
                Some(re) => re.is_match(&COMMENT_REGEX.replace_all(text, "")),
                None => return Classification::Indeterminate,
            },
        };

        if found {
            Classification::Success
        } else {
            Classification::Failure
        }
    }

    /// Classify the artifact of a compliance stage that has just run.
    ///
    /// Only a file written by this execution is read. A stage without an exit
    /// code (spawn failure, template error, timeout) or an artifact older than
    /// the stage start yields `Indeterminate`.
    pub async fn classify_stage_output(
        &self,
        result: &StageResult,
        artifact: &Path,
    ) -> ComplianceResult {
        if result.exit_code.is_none() {
            let detail = format!(
                "stage did not run to completion: {}",
                result.failure_reason()
            );
            return self.indeterminate(&result.stage, artifact, detail);
        }

        if let Ok(modified) = tokio::fs::metadata(artifact).await.and_then(|m| m.modified()) {
            let not_before = SystemTime::from(result.started_at)
                .checked_sub(MTIME_TOLERANCE)
                .unwrap_or(SystemTime::UNIX_EPOCH);
            if modified < not_before {
                warn!(
                    "Compliance artifact {} predates stage '{}'",
                    artifact.display(),
                    result.stage
                );
                let detail = "artifact is stale: not written by this run".to_string();
                return self.indeterminate(&result.stage, artifact, detail);
            }
        }

        self.classify_artifact(&result.stage, artifact).await
    }

    /// Read and classify the artifact produced by `stage`
    pub async fn classify_artifact(&self, stage: &str, artifact: &Path) -> ComplianceResult {
        let (classification, detail) = match tokio::fs::read(artifact).await {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let classification = self.classify_text(&text);
                let detail = match classification {
                    Classification::Success => format!("marker '{}' found", self.marker),
                    Classification::Failure => format!("marker '{}' not found", self.marker),
                    Classification::Indeterminate => {
                        format!("marker '{}' is not an element name", self.marker)
                    }
                };
                (classification, detail)
            }
            Err(e) => {
                warn!("Compliance artifact {} unreadable: {}", artifact.display(), e);
                (
                    Classification::Indeterminate,
                    format!("artifact unreadable: {}", e),
                )
            }
        };

        info!(
            "Compliance classification for '{}': {} ({})",
            stage, classification, detail
        );

        ComplianceResult {
            stage: stage.to_string(),
            artifact: artifact.to_path_buf(),
            classification,
            mode: self.mode,
            detail,
        }
    }

    fn indeterminate(&self, stage: &str, artifact: &Path, detail: String) -> ComplianceResult {
        info!(
            "Compliance classification for '{}': {} ({})",
            stage,
            Classification::Indeterminate,
            detail
        );
        ComplianceResult {
            stage: stage.to_string(),
            artifact: artifact.to_path_buf(),
            classification: Classification::Indeterminate,
            mode: self.mode,
            detail,
        }
    }

    /// Element name taken from a marker like `<complianceScan>`
    fn element_name(&self) -> Option<&str> {
        let name = self
            .marker
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>')
            .trim_end_matches('/')
            .split_whitespace()
            .next()?;
        let valid = name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'));
        (valid && !name.is_empty()).then_some(name)
    }

    fn element_regex(&self) -> Option<Regex> {
        let name = regex::escape(self.element_name()?);
        let pattern = format!(
            r"(?s)<{name}(?:\s[^>]*)?>.*?</{name}\s*>|<{name}(?:\s[^>]*)?/>",
            name = name
        );
        Regex::new(&pattern).ok()
    }
}
