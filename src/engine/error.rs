//! Orchestrator error types

use crate::workflow::expressions::ExpressionError;

/// Errors that can occur while invoking a stage's command.
///
/// None of these escape [`Orchestrator::run`](super::Orchestrator::run):
/// each one is recorded on the failing stage's result.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Expression error: {0}")]
    ExpressionError(#[from] ExpressionError),

    #[error("Failed to start '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {0}ms")]
    Timeout(u64),
}
