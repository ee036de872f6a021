//! Pipeline, Stage, and command definitions
//!
//! A pipeline is an ordered list of stages. Each stage wraps exactly one
//! external tool invocation described by a typed [`CommandSpec`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

// ============================================================================
// Pipeline
// ============================================================================

/// A complete pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline name (required)
    pub name: String,

    /// Environment variables available to every stage's templates and process
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Which stage produces the compliance artifact, and how to inspect it
    #[serde(default)]
    pub compliance: Option<ComplianceGate>,

    /// Stages, executed in declaration order
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Look up a stage by name
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// The stage designated as the compliance scan, if any
    pub fn compliance_stage(&self) -> Option<&Stage> {
        self.compliance
            .as_ref()
            .and_then(|gate| self.stage(&gate.stage))
    }
}

/// Designates the compliance stage and the marker looked for in its artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceGate {
    /// Name of the stage whose artifact is classified
    pub stage: String,

    /// Literal marker searched for in the artifact text
    #[serde(default = "default_marker")]
    pub marker: String,
}

fn default_marker() -> String {
    "<complianceScan>".to_string()
}

// ============================================================================
// Stage
// ============================================================================

/// A single named stage wrapping one external tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Unique stage name
    pub name: String,

    /// Command to execute
    pub run: CommandSpec,

    /// Keep going when this stage exits non-zero
    #[serde(default)]
    pub continue_on_failure: bool,

    /// File produced by the stage (e.g. a scan report)
    #[serde(default)]
    pub artifact: Option<PathBuf>,

    /// Timeout for this stage in milliseconds
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Stage-level environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Working directory for the process
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl Stage {
    pub fn new(name: impl Into<String>, run: CommandSpec) -> Self {
        Self {
            name: name.into(),
            run,
            continue_on_failure: false,
            artifact: None,
            timeout: None,
            env: HashMap::new(),
            working_dir: None,
        }
    }

    pub fn continue_on_failure(mut self, yes: bool) -> Self {
        self.continue_on_failure = yes;
        self
    }

    pub fn with_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, ms: u64) -> Self {
        self.timeout = Some(ms);
        self
    }
}

/// Typed command descriptor: an executable and its argument list.
///
/// Arguments are never passed through a shell. Each entry may contain
/// `${{ }}` templates and always renders to exactly one argv element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Human-readable form for logs
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_deserialize() {
        let yaml = r#"
name: secure-delivery
env:
  REPORT_DIR: ./reports
compliance:
  stage: compliance-scan
stages:
  - name: secret-scan
    run:
      program: trufflehog
      args: ["git", "file://."]
    continue_on_failure: true
  - name: compliance-scan
    run:
      program: qualys-scan
      args: ["--out", "report.xml"]
    artifact: report.xml
    timeout: 600000
"#;

        let pipeline: Pipeline = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(pipeline.name, "secure-delivery");
        assert_eq!(pipeline.stages.len(), 2);
        assert!(pipeline.stages[0].continue_on_failure);
        assert!(!pipeline.stages[1].continue_on_failure);
        assert_eq!(pipeline.stages[1].timeout, Some(600000));

        let gate = pipeline.compliance.as_ref().unwrap();
        assert_eq!(gate.marker, "<complianceScan>");
        assert_eq!(
            pipeline.compliance_stage().unwrap().artifact,
            Some(PathBuf::from("report.xml"))
        );
    }

    #[test]
    fn test_command_without_args() {
        let yaml = r#"
name: bare
stages:
  - name: version
    run:
      program: kube-bench
"#;

        let pipeline: Pipeline = serde_yaml::from_str(yaml).unwrap();
        assert!(pipeline.stages[0].run.args.is_empty());
        assert_eq!(pipeline.stages[0].run.display(), "kube-bench");
    }

    #[test]
    fn test_command_display() {
        let cmd = CommandSpec::new("trivy", ["image", "app:1.0"]);
        assert_eq!(cmd.display(), "trivy image app:1.0");
    }
}
