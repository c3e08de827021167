//! CLI for swesmoke - smoke-test a SWE-bench evaluation pipeline on one instance.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use swesmoke_core::config::{load_config_with_overrides, ConfigOverrides, SmokeConfig};
use swesmoke_core::report::{format_report, read_report, report_path};
use swesmoke_core::reporter::PrintReporter;
use swesmoke_core::smoke::{DEFAULT_INSTANCE_ID, DEFAULT_PATCH_FILE, DEFAULT_RUN_ID};
use swesmoke_core::{SmokeOutcome, SmokeParams, SmokeTest};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "swesmoke.yaml";

/// Exit code for expected-absent conditions under `--strict`.
const EXIT_INCOMPLETE: u8 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "swesmoke",
    about = "Run a single-instance evaluation smoke test"
)]
struct Cli {
    /// Path to the configuration file (defaults to ./swesmoke.yaml when present).
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Instance ID to evaluate.
    #[arg(long, global = true, default_value = DEFAULT_INSTANCE_ID)]
    instance_id: String,

    /// Run ID for the evaluation (default: modal_test).
    #[arg(long, global = true)]
    run_id: Option<String>,

    /// Path to the patch file.
    #[arg(long, default_value = DEFAULT_PATCH_FILE)]
    patch_file: String,

    /// Dataset source (huggingface:<repo>, local:<path>, or a path).
    #[arg(long)]
    dataset: Option<String>,

    #[arg(long)]
    split: Option<String>,

    #[arg(long)]
    cache_dir: Option<String>,

    /// Root directory the evaluator writes logs and reports into.
    #[arg(long, global = true)]
    logs_dir: Option<String>,

    /// Override the evaluation timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Run the harness locally instead of on Modal.
    #[arg(long)]
    no_modal: bool,

    /// Exit with code 2 when the instance or the report is missing.
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load and print the effective configuration.
    ShowConfig,

    /// Print an existing report without running an evaluation.
    Report,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            println!("\nError: {err}");
            eprintln!("{err:?}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let overrides = ConfigOverrides {
        dataset_source: cli.dataset.clone(),
        split: cli.split.clone(),
        cache_dir: cli.cache_dir.clone(),
        timeout_seconds: cli.timeout,
        modal: cli.no_modal.then_some(false),
        logs_dir: cli.logs_dir.clone(),
    };
    let config_path = resolve_config_path(cli.config.as_deref())?;
    let config = load_config_with_overrides(config_path.as_deref(), overrides)
        .context("failed to load configuration")?;

    match cli.command {
        Some(Command::ShowConfig) => {
            let yaml = serde_yaml::to_string(&config)?;
            println!("{yaml}");
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Report) => show_report(&config, &cli.instance_id, cli.run_id, cli.strict),
        None => {
            let params = SmokeParams {
                instance_id: cli.instance_id,
                run_id: cli.run_id,
                patch_file: PathBuf::from(cli.patch_file),
            };
            run_smoke(config, &params, cli.strict)
        }
    }
}

/// An explicit `--config` must exist; the default file is optional.
fn resolve_config_path(explicit: Option<&str>) -> Result<Option<PathBuf>> {
    match explicit {
        Some(path) => {
            let path = PathBuf::from(path);
            if !path.is_file() {
                return Err(anyhow!("config file not found: {}", path.display()));
            }
            Ok(Some(path))
        }
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            Ok(default.is_file().then(|| default.to_path_buf()))
        }
    }
}

fn run_smoke(config: SmokeConfig, params: &SmokeParams, strict: bool) -> Result<ExitCode> {
    let smoke = SmokeTest::from_config(config)?.with_reporter(Arc::new(PrintReporter));

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = match rt.block_on(smoke.run(params)) {
        Ok(outcome) => outcome,
        Err(err) => {
            let err = anyhow::Error::from(err);
            println!("\nError during evaluation: {err}");
            eprintln!("{err:?}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let complete = match &outcome {
        SmokeOutcome::InstanceNotFound { .. } => false,
        SmokeOutcome::Evaluated(summary) => {
            if summary.report.is_none() {
                tracing::info!(
                    path = %summary.report_path().display(),
                    "no report written by the evaluator"
                );
            }
            outcome.has_report()
        }
    };

    if strict && !complete {
        return Ok(ExitCode::from(EXIT_INCOMPLETE));
    }
    Ok(ExitCode::SUCCESS)
}

fn show_report(
    config: &SmokeConfig,
    instance_id: &str,
    run_id: Option<String>,
    strict: bool,
) -> Result<ExitCode> {
    let run_id = run_id.unwrap_or_else(|| DEFAULT_RUN_ID.to_string());
    let path = report_path(
        &config.report_root(),
        &run_id,
        &config.evaluator.model_name,
        instance_id,
    );
    match read_report(&path)? {
        Some(report) => {
            println!("{}", format_report(&report));
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("No report found at {}", path.display());
            if strict {
                Ok(ExitCode::from(EXIT_INCOMPLETE))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}
