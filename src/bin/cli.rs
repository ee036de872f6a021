use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pipeline_gate::prelude::*;
use pipeline_gate::NotificationOutcome;
use tracing_subscriber::EnvFilter;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "pipeline-gate")]
#[command(about = "Run security pipelines stage by stage", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline file
    Run {
        /// Path to the pipeline YAML file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Path to an orchestrator config YAML file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Container image name (overrides config)
        #[arg(long)]
        image_name: Option<String>,

        /// Container image tag (overrides config)
        #[arg(long)]
        image_tag: Option<String>,

        /// Target URL for dynamic scanning (overrides config)
        #[arg(long)]
        target_url: Option<String>,

        /// Webhook URL for the run summary (overrides config)
        #[arg(long)]
        webhook_url: Option<String>,

        /// Require a complete compliance element instead of a substring match
        #[arg(long)]
        strict_compliance: bool,

        /// Extra template variable, KEY=VALUE (repeatable)
        #[arg(short, long = "env", value_name = "KEY=VALUE")]
        env: Vec<String>,

        /// Expose an environment variable as ${{ secrets.NAME }} (repeatable)
        #[arg(short, long = "secret", value_name = "NAME")]
        secret: Vec<String>,

        /// Print the run as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a pipeline file without running it
    Validate {
        /// Path to the pipeline YAML file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// List the stages of a pipeline in execution order
    List {
        /// Path to the pipeline YAML file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[cfg(feature = "otel")]
fn init_otel_tracing(verbose: bool) {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::runtime::Tokio;
    use opentelemetry_sdk::trace::TracerProvider;

    let filter = if verbose {
        "pipeline_gate=debug"
    } else {
        "pipeline_gate=info"
    };

    let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string());

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&otlp_endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => {
            eprintln!("Failed to create OTLP exporter: {}", e);
            init_tracing(verbose);
            return;
        }
    };

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .build();

    let tracer = provider.tracer("pipeline-gate");
    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(otel_layer)
        .init();

    opentelemetry::global::set_tracer_provider(provider);
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "pipeline_gate=debug"
    } else {
        "pipeline_gate=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    #[cfg(feature = "otel")]
    init_otel_tracing(cli.verbose);

    #[cfg(not(feature = "otel"))]
    init_tracing(cli.verbose);

    let result = run(cli).await;

    #[cfg(feature = "otel")]
    opentelemetry::global::shutdown_tracer_provider();

    match result {
        Ok(success) => {
            if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "pipeline-gate failed");
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Run {
            file,
            config,
            image_name,
            image_tag,
            target_url,
            webhook_url,
            strict_compliance,
            env,
            secret,
            json,
        } => {
            let mut config = match config {
                Some(path) => OrchestratorConfig::load_file(&path)?,
                None => OrchestratorConfig::default(),
            };
            if image_name.is_some() {
                config.image_name = image_name;
            }
            if image_tag.is_some() {
                config.image_tag = image_tag;
            }
            if target_url.is_some() {
                config.target_url = target_url;
            }
            if let Some(url) = webhook_url {
                let mut webhook = config.webhook.take().unwrap_or_else(|| WebhookConfig::new(""));
                webhook.url = url;
                config.webhook = Some(webhook);
            }
            if strict_compliance {
                config.compliance_mode = ComplianceMode::Strict;
            }

            run_pipeline(file, config, &env, &secret, json).await
        }
        Commands::Validate { file } => validate(file),
        Commands::List { file } => list_stages(file),
    }
}

async fn run_pipeline(
    file: PathBuf,
    config: OrchestratorConfig,
    env: &[String],
    secrets: &[String],
    json: bool,
) -> anyhow::Result<bool> {
    if !file.exists() {
        anyhow::bail!("Pipeline file not found: {}", file.display());
    }

    let pipeline = PipelineLoader::load_file(&file)?;
    let mut orchestrator = Orchestrator::new(config)?;

    for pair in env {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected KEY=VALUE, got: {}", pair))?;
        orchestrator.set_env(key, value);
    }
    for name in secrets {
        let value = std::env::var(name)
            .map_err(|_| anyhow::anyhow!("Secret {} is not set in the environment", name))?;
        orchestrator.set_secret(name, &value);
    }

    if !json {
        println!("Running pipeline: {}\n", file.display());
    }

    let run = orchestrator.run(&pipeline).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_run(&run);
    }

    Ok(!run.is_aborted())
}

fn print_run(run: &PipelineRun) {
    println!("\n=== Pipeline Result ===\n");
    match &run.status {
        RunStatus::Completed => println!("Status: COMPLETED"),
        RunStatus::Aborted { stage, reason } => {
            println!("Status: ABORTED at {} ({})", stage, reason)
        }
    }
    println!("Run ID: {}\n", run.run_id);

    for result in &run.results {
        let mark = match result.status {
            StageStatus::Passed => "✓",
            StageStatus::Failed => "✗",
            StageStatus::TimedOut => "⏱",
        };
        println!("{} {} ({}ms)", mark, result.stage, result.duration_ms());
        if let Some(err) = &result.error {
            println!("    Error: {}", err);
        } else if !result.success() {
            println!("    {}", result.failure_reason());
        }
    }

    if let Some(compliance) = &run.compliance {
        println!(
            "\nCompliance: {} ({})",
            compliance.classification, compliance.detail
        );
    }

    match &run.notification {
        NotificationOutcome::Delivered => println!("Notification: delivered"),
        NotificationOutcome::Skipped => println!("Notification: no webhook configured"),
        NotificationOutcome::Failed(e) => println!("Notification: FAILED ({})", e),
    }
}

fn validate(file: PathBuf) -> anyhow::Result<bool> {
    if !file.exists() {
        anyhow::bail!("Path not found: {}", file.display());
    }

    let pipeline = PipelineLoader::load_file(&file)?;
    println!(
        "✓ {} is valid ({} stages)",
        file.display(),
        pipeline.stages.len()
    );
    Ok(true)
}

fn list_stages(file: PathBuf) -> anyhow::Result<bool> {
    if !file.exists() {
        anyhow::bail!("Pipeline file not found: {}", file.display());
    }

    let pipeline = PipelineLoader::load_file(&file)?;
    println!("Stages in {}:\n", pipeline.name);

    let compliance_stage = pipeline.compliance.as_ref().map(|g| g.stage.as_str());
    for (i, stage) in pipeline.stages.iter().enumerate() {
        let mut flags = Vec::new();
        if stage.continue_on_failure {
            flags.push("continue-on-failure");
        }
        if compliance_stage == Some(stage.name.as_str()) {
            flags.push("compliance");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        println!("  {}. {}{}", i + 1, stage.name, flags);
        println!("     {}", stage.run.display());
    }

    Ok(true)
}
