//! Progress reporting trait and events for a smoke-test run.

use crate::report::format_report;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Events emitted while a smoke test runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SmokeEvent {
    /// Dataset retrieval started.
    LoadingDataset { name: String, split: String },
    /// Dataset retrieval finished.
    DatasetLoaded { count: usize },
    InstanceNotFound { instance_id: String },
    InstanceFound {
        instance_id: String,
        problem_preview: String,
    },
    PatchLoaded { path: PathBuf },
    /// Patch file missing or unreadable; the built-in patch is used.
    PatchFallback {
        path: PathBuf,
        reason: Option<String>,
    },
    EvaluationStarted {
        instance_id: String,
        run_id: String,
        timeout_seconds: u64,
    },
    EvaluationCompleted,
    ResultsSaved { log_dir: PathBuf },
    Report { report: Value },
    Resolution { instance_id: String, resolved: bool },
}

impl SmokeEvent {
    /// Console text for the event.
    pub fn render(&self) -> String {
        match self {
            SmokeEvent::LoadingDataset { name, split } => {
                format!("Loading {name} dataset (split: {split})...")
            }
            SmokeEvent::DatasetLoaded { count } => format!("Loaded {count} instance(s)"),
            SmokeEvent::InstanceNotFound { instance_id } => {
                format!("Instance {instance_id} not found in dataset!")
            }
            SmokeEvent::InstanceFound {
                instance_id,
                problem_preview,
            } => format!("Found instance: {instance_id}\nProblem statement: {problem_preview}..."),
            SmokeEvent::PatchLoaded { path } => {
                format!("Reading patch from: {}", path.display())
            }
            SmokeEvent::PatchFallback { path, reason } => match reason {
                Some(reason) => format!(
                    "Patch file unreadable: {} ({reason})\nUsing default test patch...",
                    path.display()
                ),
                None => format!(
                    "Patch file not found: {}\nUsing default test patch...",
                    path.display()
                ),
            },
            SmokeEvent::EvaluationStarted {
                instance_id,
                run_id,
                timeout_seconds,
            } => format!(
                "\nStarting Modal evaluation:\n- Instance ID: {instance_id}\n- Run ID: {run_id}\n- Timeout: {timeout_seconds} seconds"
            ),
            SmokeEvent::EvaluationCompleted => "\nEvaluation completed successfully!".to_string(),
            SmokeEvent::ResultsSaved { log_dir } => {
                format!("\nResults saved to: {}", log_dir.display())
            }
            SmokeEvent::Report { report } => {
                format!("\nEvaluation report:\n{}", format_report(report))
            }
            SmokeEvent::Resolution {
                instance_id,
                resolved,
            } => {
                let status = if *resolved { "RESOLVED" } else { "UNRESOLVED" };
                format!("[{status}] {instance_id}")
            }
        }
    }
}

/// Trait for smoke-test reporters.
pub trait SmokeReporter: Send + Sync {
    fn report(&self, event: SmokeEvent);
}

/// A no-op reporter that discards all events.
#[derive(Debug, Default)]
pub struct NullReporter;

impl SmokeReporter for NullReporter {
    fn report(&self, _event: SmokeEvent) {}
}

/// Prints every event to stdout.
#[derive(Debug, Default)]
pub struct PrintReporter;

impl SmokeReporter for PrintReporter {
    fn report(&self, event: SmokeEvent) {
        println!("{}", event.render());
    }
}
