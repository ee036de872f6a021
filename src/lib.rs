//! # Pipeline Gate
//!
//! A sequential orchestrator for security pipelines: each stage wraps one
//! external tool (secret scanner, SAST engine, dependency checker, image
//! scanner, DAST scanner, cluster benchmark, compliance scanner, ...),
//! stages run strictly in declaration order, a failing stage either aborts
//! the run or is tolerated, and every run ends with exactly one summary
//! notification.
//!
//! ## Features
//!
//! - **Declarative YAML pipelines** - stages with typed commands, no shell
//! - **Failure gating** - per-stage `continue_on_failure`
//! - **Compliance classification** - marker search in a scan artifact
//!   (weak substring by default, strict element check on request)
//! - **Webhook notification** - one `{"text": ...}` POST per run
//! - **Templates** - `${{ config.image }}`, `${{ env.X }}`, `${{ secrets.X }}`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pipeline_gate::{Orchestrator, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline_yaml = r#"
//! name: secure-delivery
//! stages:
//!   - name: secret-scan
//!     run:
//!       program: gitleaks
//!       args: ["detect", "--source", "."]
//!   - name: image-scan
//!     run:
//!       program: trivy
//!       args: ["image", "${{ config.image }}"]
//! "#;
//!
//!     let config = OrchestratorConfig {
//!         image_name: Some("shop".to_string()),
//!         image_tag: Some("1.0".to_string()),
//!         ..Default::default()
//!     };
//!
//!     let orchestrator = Orchestrator::new(config)?;
//!     let run = orchestrator.run_yaml(pipeline_yaml).await?;
//!
//!     println!("Pipeline aborted: {}", run.is_aborted());
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod workflow;

// Re-export main types
pub use engine::{
    Classification, CommandOutput, CommandRequest, CommandRunner, ComplianceClassifier,
    ComplianceResult, NotificationOutcome, Notifier, NotifyError, Orchestrator,
    OrchestratorError, PipelineRun, ProcessRunner, RunStatus, RunSummary, StageResult,
    StageStatus, WebhookNotifier,
};
pub use workflow::{
    CommandSpec, ComplianceGate, ComplianceMode, ConfigError, ExecutionContext, LoadError,
    OrchestratorConfig, Pipeline, PipelineLoader, Stage, WebhookConfig, WebhookRetryConfig,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::engine::{
        Classification, CommandRunner, Notifier, Orchestrator, PipelineRun, RunStatus,
        RunSummary, StageStatus,
    };
    pub use crate::workflow::{
        CommandSpec, ComplianceMode, LoadError, OrchestratorConfig, Pipeline, PipelineLoader,
        Stage, WebhookConfig,
    };
}
