//! Pipeline execution engine module
//!
//! This module contains:
//! - `orchestrator` - The stage orchestrator
//! - `runner` - External command execution behind the `CommandRunner` trait
//! - `compliance` - Compliance artifact classification
//! - `notify` - End-of-run summary and webhook notifier
//! - `error` - Orchestrator error types
//! - `result` - Stage and run result types

pub mod compliance;
pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod result;
pub mod runner;

pub use compliance::{Classification, ComplianceClassifier, ComplianceResult};
pub use error::OrchestratorError;
pub use notify::{Notifier, NotifyError, RunSummary, WebhookNotifier};
pub use orchestrator::Orchestrator;
pub use result::{NotificationOutcome, PipelineRun, RunStatus, StageResult, StageStatus};
pub use runner::{CommandOutput, CommandRequest, CommandRunner, ProcessRunner};
