//! Pipeline types and definitions
//!
//! This module contains all types for defining and loading pipelines:
//! - `pipeline` - Pipeline, Stage, CommandSpec, and ComplianceGate
//! - `config` - OrchestratorConfig and webhook settings
//! - `context` - ExecutionContext for runtime values
//! - `expressions` - Template evaluation for `${{ }}` syntax
//! - `loader` - Load and validate pipelines from files

pub mod config;
pub mod context;
pub mod expressions;
pub mod loader;
pub mod pipeline;

// Re-export all public types for convenience
pub use config::{
    ComplianceMode, ConfigError, OrchestratorConfig, WebhookConfig, WebhookRetryConfig,
};
pub use context::ExecutionContext;
pub use expressions::{evaluate as evaluate_expression, evaluate_command, ExpressionError};
pub use loader::{LoadError, PipelineLoader};
pub use pipeline::{CommandSpec, ComplianceGate, Pipeline, Stage};
