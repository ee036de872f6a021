//! Stage Orchestrator - runs a pipeline's stages in order
//!
//! For each run the orchestrator:
//! 1. Renders each stage's command templates
//! 2. Executes stages one at a time, in declaration order
//! 3. Applies each stage's failure policy (abort or continue)
//! 4. Classifies the compliance artifact after the compliance stage
//! 5. Emits exactly one summary notification

use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::engine::compliance::{ComplianceClassifier, ComplianceResult};
use crate::engine::error::OrchestratorError;
use crate::engine::notify::{Notifier, NotifyError, RunSummary, WebhookNotifier};
use crate::engine::result::{
    excerpt, NotificationOutcome, PipelineRun, RunStatus, StageResult, StageStatus,
};
use crate::engine::runner::{CommandRequest, CommandRunner, ProcessRunner};
use crate::workflow::expressions::{evaluate, evaluate_command};
use crate::workflow::*;

pub struct Orchestrator {
    config: OrchestratorConfig,
    runner: Arc<dyn CommandRunner>,
    notifier: Option<Arc<dyn Notifier>>,
    context: ExecutionContext,
}

impl Orchestrator {
    /// Create an orchestrator that spawns real processes and, if a webhook
    /// is configured, posts the run summary to it
    pub fn new(config: OrchestratorConfig) -> Result<Self, NotifyError> {
        let notifier: Option<Arc<dyn Notifier>> = match &config.webhook {
            Some(webhook) => Some(Arc::new(WebhookNotifier::from_config(webhook)?)),
            None => None,
        };

        Ok(Self {
            context: ExecutionContext::from_config(&config),
            runner: Arc::new(ProcessRunner::new()),
            notifier,
            config,
        })
    }

    /// Replace the command runner (e.g. a scripted runner in tests)
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Replace the notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Set environment variables
    pub fn set_env(&mut self, key: &str, value: &str) {
        self.context.set_env(key, value.to_string());
    }

    /// Set secrets
    pub fn set_secret(&mut self, key: &str, value: &str) {
        self.context.set_secret(key, value.to_string());
    }

    /// Run a pipeline from a YAML string
    pub async fn run_yaml(&self, yaml: &str) -> Result<PipelineRun, LoadError> {
        let pipeline = PipelineLoader::load_str(yaml)?;
        Ok(self.run(&pipeline).await)
    }

    /// Run a pipeline to completion or abort.
    ///
    /// Never fails: tool failures, classification problems, and
    /// notification errors are all recorded on the returned run.
    #[instrument(skip(self, pipeline), fields(pipeline = %pipeline.name))]
    pub async fn run(&self, pipeline: &Pipeline) -> PipelineRun {
        let started_at = Utc::now();

        let mut ctx = self.context.clone();
        ctx.run_id = uuid::Uuid::new_v4().to_string();
        ctx.merge_env(&pipeline.env);

        info!(
            "Starting pipeline: {} ({} stages, run {})",
            pipeline.name,
            pipeline.stages.len(),
            ctx.run_id
        );

        let classifier = pipeline
            .compliance
            .as_ref()
            .map(|gate| ComplianceClassifier::new(&gate.marker, self.config.compliance_mode));

        let mut results: Vec<StageResult> = Vec::with_capacity(pipeline.stages.len());
        let mut compliance: Option<ComplianceResult> = None;
        let mut status = RunStatus::Completed;

        for (idx, stage) in pipeline.stages.iter().enumerate() {
            info!(
                "Stage {}/{}: {}",
                idx + 1,
                pipeline.stages.len(),
                stage.name
            );

            let result = self.execute_stage(stage, &pipeline.env, &mut ctx).await;

            let is_compliance_stage = pipeline
                .compliance
                .as_ref()
                .is_some_and(|gate| gate.stage == stage.name);
            if let (true, Some(classifier), Some(artifact)) =
                (is_compliance_stage, &classifier, &stage.artifact)
            {
                let path = resolve_artifact(stage, artifact);
                compliance = Some(classifier.classify_stage_output(&result, &path).await);
            }

            let passed = result.success();
            let reason = result.failure_reason();
            results.push(result);

            if passed {
                continue;
            }

            if stage.continue_on_failure {
                warn!("Stage '{}' failed ({}), continuing", stage.name, reason);
            } else {
                error!("Stage '{}' failed ({}), aborting run", stage.name, reason);
                status = RunStatus::Aborted {
                    stage: stage.name.clone(),
                    reason,
                };
                break;
            }
        }

        let mut run = PipelineRun {
            run_id: ctx.run_id.clone(),
            pipeline: pipeline.name.clone(),
            status,
            results,
            compliance,
            notification: NotificationOutcome::Skipped,
            started_at,
            finished_at: Utc::now(),
        };

        run.notification = self.notify(&run).await;
        run
    }

    /// Execute a single stage, converting every failure into a result
    #[instrument(skip(self, stage, pipeline_env, ctx), fields(stage = %stage.name))]
    async fn execute_stage(
        &self,
        stage: &Stage,
        pipeline_env: &HashMap<String, String>,
        ctx: &mut ExecutionContext,
    ) -> StageResult {
        let started_at = Utc::now();
        ctx.current_stage = Some(stage.name.clone());

        let outcome = match self.build_request(stage, pipeline_env, ctx) {
            Ok(request) => {
                info!("Executing: {}", ctx.redact(&request.command.display()));
                self.runner.run(&request).await
            }
            Err(e) => Err(e),
        };

        let limit = self.config.output_excerpt_limit;
        let (status, exit_code, output, error) = match outcome {
            Ok(output) => {
                let text = excerpt(&ctx.redact(&output.combined()), limit);
                let status = if output.success() {
                    StageStatus::Passed
                } else {
                    StageStatus::Failed
                };
                (status, output.exit_code, text, None)
            }
            Err(e @ OrchestratorError::Timeout(_)) => {
                (StageStatus::TimedOut, None, String::new(), Some(e.to_string()))
            }
            Err(e) => (StageStatus::Failed, None, String::new(), Some(e.to_string())),
        };

        let result = StageResult {
            stage: stage.name.clone(),
            status,
            exit_code,
            output,
            error,
            started_at,
            finished_at: Utc::now(),
        };

        if result.success() {
            info!("Stage '{}' passed in {}ms", stage.name, result.duration_ms());
        }

        result
    }

    /// Render templates and assemble the process request
    fn build_request(
        &self,
        stage: &Stage,
        pipeline_env: &HashMap<String, String>,
        ctx: &ExecutionContext,
    ) -> Result<CommandRequest, OrchestratorError> {
        let command = evaluate_command(&stage.run, ctx)?;
        debug!("Rendered {} argument(s)", command.args.len());

        // The child inherits the orchestrator's environment; pipeline env is
        // literal, stage env may use templates
        let mut env: HashMap<String, String> = pipeline_env.clone();
        for (key, value) in &stage.env {
            env.insert(key.clone(), evaluate(value, ctx)?);
        }

        let timeout = self
            .config
            .stage_timeout(stage.timeout)
            .map(Duration::from_millis);

        Ok(CommandRequest {
            command,
            env,
            working_dir: stage.working_dir.clone(),
            timeout,
        })
    }

    /// Deliver the single end-of-run notification
    async fn notify(&self, run: &PipelineRun) -> NotificationOutcome {
        let summary = RunSummary::from_run(run);
        info!("{}", summary.text);

        let Some(notifier) = &self.notifier else {
            debug!("No notifier configured");
            return NotificationOutcome::Skipped;
        };

        match notifier.notify(&summary).await {
            Ok(()) => NotificationOutcome::Delivered,
            Err(e) => {
                warn!("Notification delivery failed: {}", e);
                NotificationOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Relative artifact paths are resolved against the stage's working dir
fn resolve_artifact(stage: &Stage, artifact: &Path) -> PathBuf {
    match &stage.working_dir {
        Some(dir) if artifact.is_relative() => dir.join(artifact),
        _ => artifact.to_path_buf(),
    }
}
