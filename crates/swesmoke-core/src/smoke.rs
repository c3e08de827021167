//! The smoke test itself: one instance, one prediction, one evaluator call.

use crate::config::SmokeConfig;
use crate::datasets::{find_instance, get_dataset_loader, DatasetContext, DatasetLoader};
use crate::error::{Result, SmokeError};
use crate::evaluator::{CommandEvaluator, Evaluator};
use crate::patch::{resolve_patch, PatchOrigin};
use crate::report::{read_report, report_dir, InstanceReport, REPORT_FILE_NAME};
use crate::reporter::{NullReporter, SmokeEvent, SmokeReporter};
use crate::types::{EvaluationRequest, Prediction};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_INSTANCE_ID: &str = "Project-MONAI__MONAI-1095";
pub const DEFAULT_RUN_ID: &str = "modal_test";
pub const DEFAULT_PATCH_FILE: &str = "test_patch.diff";
pub const PROBLEM_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeParams {
    pub instance_id: String,
    pub run_id: Option<String>,
    pub patch_file: PathBuf,
}

impl Default for SmokeParams {
    fn default() -> Self {
        Self {
            instance_id: DEFAULT_INSTANCE_ID.to_string(),
            run_id: None,
            patch_file: PathBuf::from(DEFAULT_PATCH_FILE),
        }
    }
}

impl SmokeParams {
    /// The given run id, or `modal_test`.
    pub fn effective_run_id(&self) -> &str {
        self.run_id.as_deref().unwrap_or(DEFAULT_RUN_ID)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSummary {
    pub run_id: String,
    pub prediction: Prediction,
    pub patch_origin: PatchOrigin,
    pub log_dir: PathBuf,
    pub log_dir_exists: bool,
    pub report: Option<Value>,
}

impl EvaluationSummary {
    pub fn report_path(&self) -> PathBuf {
        self.log_dir.join(REPORT_FILE_NAME)
    }

    pub fn resolved(&self) -> Option<bool> {
        let report = self.report.as_ref()?;
        InstanceReport::from_report(report, &self.prediction.instance_id).map(|r| r.resolved)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SmokeOutcome {
    /// The instance id is not in the dataset; nothing was evaluated.
    InstanceNotFound { instance_id: String },
    Evaluated(Box<EvaluationSummary>),
}

impl SmokeOutcome {
    /// True only when the evaluator ran and left a report behind.
    pub fn has_report(&self) -> bool {
        matches!(self, SmokeOutcome::Evaluated(s) if s.report.is_some())
    }
}

pub struct SmokeTest {
    config: SmokeConfig,
    loader: Box<dyn DatasetLoader>,
    evaluator: Box<dyn Evaluator>,
    reporter: Arc<dyn SmokeReporter>,
}

impl SmokeTest {
    pub fn new(
        config: SmokeConfig,
        loader: Box<dyn DatasetLoader>,
        evaluator: Box<dyn Evaluator>,
    ) -> Self {
        Self {
            config,
            loader,
            evaluator,
            reporter: Arc::new(NullReporter),
        }
    }

    /// Wire the configured dataset loader and the harness subprocess evaluator.
    pub fn from_config(config: SmokeConfig) -> Result<Self> {
        let ctx = DatasetContext {
            root_dir: std::env::current_dir()?,
            cache_dir: config.cache_dir(),
        };
        let loader = get_dataset_loader(config.dataset.clone(), ctx);
        let evaluator = CommandEvaluator::new(config.evaluator.clone(), config.report_root());
        Ok(Self::new(config, loader, Box::new(evaluator)))
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn SmokeReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    fn emit(&self, event: SmokeEvent) {
        self.reporter.report(event);
    }

    pub async fn run(&self, params: &SmokeParams) -> Result<SmokeOutcome> {
        let run_id = params.effective_run_id().to_string();
        let instance_id = params.instance_id.as_str();
        let dataset = &self.config.dataset;

        self.emit(SmokeEvent::LoadingDataset {
            name: dataset.name.clone(),
            split: dataset.split.clone(),
        });
        let instances = self.loader.load().await.map_err(|e| match e {
            SmokeError::Dataset { .. } => e,
            other => SmokeError::dataset(dataset.name.clone(), other),
        })?;
        self.emit(SmokeEvent::DatasetLoaded {
            count: instances.len(),
        });

        let Some(instance) = find_instance(&instances, instance_id) else {
            info!(instance_id, "instance not found, skipping evaluation");
            self.emit(SmokeEvent::InstanceNotFound {
                instance_id: instance_id.to_string(),
            });
            return Ok(SmokeOutcome::InstanceNotFound {
                instance_id: instance_id.to_string(),
            });
        };
        self.emit(SmokeEvent::InstanceFound {
            instance_id: instance_id.to_string(),
            problem_preview: instance.problem_preview(PROBLEM_PREVIEW_CHARS).to_string(),
        });

        let patch = resolve_patch(&params.patch_file);
        match &patch.origin {
            PatchOrigin::File(path) => self.emit(SmokeEvent::PatchLoaded { path: path.clone() }),
            PatchOrigin::Fallback { requested, reason } => {
                self.emit(SmokeEvent::PatchFallback {
                    path: requested.clone(),
                    reason: reason.clone(),
                })
            }
        }

        let model_name = &self.config.evaluator.model_name;
        let timeout_seconds = self.config.evaluator.timeout_seconds;
        let prediction = Prediction::new(instance_id, model_name.as_str(), patch.text)?;
        let request = EvaluationRequest::single(
            instance.clone(),
            prediction.clone(),
            run_id.clone(),
            timeout_seconds,
        )?;

        self.emit(SmokeEvent::EvaluationStarted {
            instance_id: instance_id.to_string(),
            run_id: run_id.clone(),
            timeout_seconds,
        });
        self.evaluator.run_instances(&request).await?;
        self.emit(SmokeEvent::EvaluationCompleted);

        let log_dir = report_dir(&self.config.report_root(), &run_id, model_name, instance_id);
        let log_dir_exists = log_dir.is_dir();
        let mut report = None;
        if log_dir_exists {
            self.emit(SmokeEvent::ResultsSaved {
                log_dir: log_dir.clone(),
            });
            report = read_report(&log_dir.join(REPORT_FILE_NAME))?;
        } else {
            debug!(path = %log_dir.display(), "no results directory");
        }

        let summary = EvaluationSummary {
            run_id,
            prediction,
            patch_origin: patch.origin,
            log_dir,
            log_dir_exists,
            report,
        };
        if let Some(report) = &summary.report {
            self.emit(SmokeEvent::Report {
                report: report.clone(),
            });
            if let Some(resolved) = summary.resolved() {
                self.emit(SmokeEvent::Resolution {
                    instance_id: instance_id.to_string(),
                    resolved,
                });
            }
        }

        Ok(SmokeOutcome::Evaluated(Box::new(summary)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params() {
        let params = SmokeParams::default();
        assert_eq!(params.instance_id, "Project-MONAI__MONAI-1095");
        assert_eq!(params.patch_file, PathBuf::from("test_patch.diff"));
        assert_eq!(params.effective_run_id(), "modal_test");
    }

    #[test]
    fn explicit_run_id_wins() {
        let params = SmokeParams {
            run_id: Some("nightly".into()),
            ..SmokeParams::default()
        };
        assert_eq!(params.effective_run_id(), "nightly");
    }
}
