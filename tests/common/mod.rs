#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pipeline_gate::{
    CommandOutput, CommandRequest, CommandRunner, CommandSpec, Notifier, NotifyError,
    OrchestratorConfig, OrchestratorError, Pipeline, RunSummary, Stage,
};
use tempfile::TempDir;

pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

pub fn write_file(dir: &Path, filename: &str, content: &str) {
    fs::write(dir.join(filename), content).expect("Failed to write file");
}

/// Config that doesn't leak the test process environment into templates
pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        inherit_env: false,
        ..Default::default()
    }
}

/// Stage whose "program" is just its name, for the scripted runner
pub fn stage(name: &str) -> Stage {
    Stage::new(name, CommandSpec::new(name, Vec::<String>::new()))
}

pub fn pipeline(name: &str, stages: Vec<Stage>) -> Pipeline {
    Pipeline {
        name: name.to_string(),
        env: HashMap::new(),
        compliance: None,
        stages,
    }
}

/// Runner that answers from a table of program -> exit code and records
/// every request it receives
#[derive(Default)]
pub struct ScriptedRunner {
    exit_codes: HashMap<String, i32>,
    pub calls: Mutex<Vec<CommandRequest>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exit(mut self, program: &str, code: i32) -> Self {
        self.exit_codes.insert(program.to_string(), code);
        self
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.command.program.clone())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, OrchestratorError> {
        self.calls.lock().unwrap().push(request.clone());
        let code = self
            .exit_codes
            .get(&request.command.program)
            .copied()
            .unwrap_or(0);
        Ok(CommandOutput {
            exit_code: Some(code),
            stdout: format!("{} ran", request.command.program),
            stderr: String::new(),
        })
    }
}

/// Notifier that remembers every summary; optionally fails delivery
#[derive(Default)]
pub struct RecordingNotifier {
    fail: bool,
    pub summaries: Mutex<Vec<RunSummary>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            summaries: Mutex::new(Vec::new()),
        })
    }

    pub fn summaries(&self) -> Vec<RunSummary> {
        self.summaries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, summary: &RunSummary) -> Result<(), NotifyError> {
        self.summaries.lock().unwrap().push(summary.clone());
        if self.fail {
            return Err(NotifyError::HttpError {
                status: 503,
                message: "webhook down".to_string(),
            });
        }
        Ok(())
    }
}

pub fn simple_pipeline_yaml(name: &str) -> String {
    format!(
        r#"
name: {}
stages:
  - name: hello
    run:
      program: sh
      args: ["-c", "echo hello"]
"#,
        name
    )
}

pub fn failing_pipeline_yaml(name: &str) -> String {
    format!(
        r#"
name: {}
stages:
  - name: lint
    run:
      program: sh
      args: ["-c", "exit 0"]
  - name: scan
    run:
      program: sh
      args: ["-c", "echo findings >&2; exit 4"]
  - name: deploy
    run:
      program: sh
      args: ["-c", "echo deployed"]
"#,
        name
    )
}
