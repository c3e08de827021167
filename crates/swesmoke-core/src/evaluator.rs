//! Delegated evaluation: hand a prediction to an external harness.
//!
//! [`CommandEvaluator`] drives the SWE-bench harness CLI as a subprocess. The
//! dataset slice and predictions are staged as files next to the run's logs,
//! the harness is invoked once, and its stdout/stderr are forwarded to
//! `tracing`. A non-zero exit status is reported as [`SmokeError::Evaluator`].

use crate::config::EvaluatorConfig;
use crate::error::{Result, SmokeError};
use crate::types::EvaluationRequest;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

const STAGING_DIR_NAME: &str = ".swesmoke";
const STDERR_TAIL_LINES: usize = 20;

#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Evaluate every prediction in `request`. Artifacts land wherever the
    /// evaluator writes them; only success or failure is returned.
    async fn run_instances(&self, request: &EvaluationRequest) -> Result<()>;
}

/// Files written before the harness is spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedInputs {
    pub dataset_path: PathBuf,
    pub predictions_path: PathBuf,
}

pub struct CommandEvaluator {
    config: EvaluatorConfig,
    logs_root: PathBuf,
}

impl CommandEvaluator {
    pub fn new(config: EvaluatorConfig, logs_root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            logs_root: logs_root.into(),
        }
    }

    /// `<logs_root>/<run_id>/.swesmoke`
    pub fn staging_dir(&self, run_id: &str) -> PathBuf {
        self.logs_root.join(run_id).join(STAGING_DIR_NAME)
    }

    /// Write `full_dataset` as a JSON array and predictions as JSONL.
    pub async fn stage_inputs(&self, request: &EvaluationRequest) -> Result<StagedInputs> {
        let dir = self.staging_dir(&request.run_id);
        fs::create_dir_all(&dir).await?;
        // Absolute so the harness can run from a different work_dir.
        let dir = fs::canonicalize(&dir).await?;

        let dataset_path = dir.join("dataset.json");
        let dataset = serde_json::to_string(&request.full_dataset)?;
        fs::write(&dataset_path, dataset).await?;

        let predictions_path = dir.join("predictions.jsonl");
        let mut lines = String::new();
        for prediction in request.predictions.values() {
            lines.push_str(&serde_json::to_string(prediction)?);
            lines.push('\n');
        }
        fs::write(&predictions_path, lines).await?;

        Ok(StagedInputs {
            dataset_path,
            predictions_path,
        })
    }

    /// Argument vector passed after `program`.
    pub fn build_args(&self, request: &EvaluationRequest, staged: &StagedInputs) -> Vec<String> {
        let mut args = self.config.args.clone();
        args.push("--dataset_name".into());
        args.push(staged.dataset_path.to_string_lossy().to_string());
        args.push("--predictions_path".into());
        args.push(staged.predictions_path.to_string_lossy().to_string());
        args.push("--instance_ids".into());
        args.extend(request.instance_ids().into_iter().map(String::from));
        args.push("--run_id".into());
        args.push(request.run_id.clone());
        args.push("--timeout".into());
        args.push(request.timeout_seconds.to_string());
        args.push("--max_workers".into());
        args.push(self.config.max_workers.to_string());
        if self.config.modal {
            args.push("--modal".into());
            args.push("true".into());
        }
        args
    }

    fn work_dir(&self) -> Option<&Path> {
        self.config
            .work_dir
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(Path::new)
    }
}

#[async_trait]
impl Evaluator for CommandEvaluator {
    async fn run_instances(&self, request: &EvaluationRequest) -> Result<()> {
        let staged = self.stage_inputs(request).await?;
        let args = self.build_args(request, &staged);

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&args)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = self.work_dir() {
            cmd.current_dir(dir);
        }

        info!(program = %self.config.program, run_id = %request.run_id, "starting evaluator");
        let mut child = cmd.spawn().map_err(|e| {
            SmokeError::Evaluator(format!("failed to spawn {}: {e}", self.config.program))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SmokeError::Evaluator("child missing stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SmokeError::Evaluator("child missing stderr".into()))?;

        let stdout_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.trim().is_empty() {
                    info!("[harness] {}", line);
                }
            }
        });
        let stderr_task = tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                warn!("[harness stderr] {}", line);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail
        });

        let status = child.wait().await?;
        if let Err(e) = stdout_task.await {
            warn!(error = %e, "harness stdout reader failed");
        }
        let tail = match stderr_task.await {
            Ok(tail) => tail,
            Err(e) => {
                warn!(error = %e, "harness stderr reader failed");
                VecDeque::new()
            }
        };

        if !status.success() {
            let mut message = format!("{} exited with {status}", self.config.program);
            if !tail.is_empty() {
                message.push_str(": ");
                message.push_str(&Vec::from(tail).join("\n"));
            }
            return Err(SmokeError::Evaluator(message));
        }
        info!(run_id = %request.run_id, "evaluator finished");
        Ok(())
    }
}
