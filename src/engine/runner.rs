//! External command execution
//!
//! Stages never touch `tokio::process` directly; they go through the
//! [`CommandRunner`] trait so the orchestrator can be driven by a scripted
//! runner in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::engine::error::OrchestratorError;
use crate::workflow::CommandSpec;

/// A fully rendered command, ready to spawn
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub command: CommandSpec,
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl CommandRequest {
    pub fn new(command: CommandSpec) -> Self {
        Self {
            command,
            env: HashMap::new(),
            working_dir: None,
            timeout: None,
        }
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr, each trimmed
    pub fn combined(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{}\n{}", out, err),
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion.
    ///
    /// A non-zero exit is not an error here; errors mean the process could
    /// not be started or did not finish in time.
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, OrchestratorError>;
}

/// Runs commands as child processes of the orchestrator
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, OrchestratorError> {
        let spec = &request.command;

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        cmd.envs(&request.env);

        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // Dropping the output future on timeout must not leave the tool running
        cmd.kill_on_drop(true);

        debug!("Spawning {}", spec.program);

        let output = match request.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| OrchestratorError::Timeout(limit.as_millis() as u64))?,
            None => cmd.output().await,
        }
        .map_err(|e| OrchestratorError::SpawnFailed {
            program: spec.program.clone(),
            source: e,
        })?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        info!(
            "{} exited with {}",
            spec.program,
            result
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string())
        );

        Ok(result)
    }
}
