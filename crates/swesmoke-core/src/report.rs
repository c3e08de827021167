//! Locating and reading the per-instance evaluation report.

use crate::error::{Result, SmokeError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub const REPORT_FILE_NAME: &str = "report.json";

/// `<logs_root>/<run_id>/<model_name>/<instance_id>`
pub fn report_dir(logs_root: &Path, run_id: &str, model_name: &str, instance_id: &str) -> PathBuf {
    logs_root.join(run_id).join(model_name).join(instance_id)
}

pub fn report_path(logs_root: &Path, run_id: &str, model_name: &str, instance_id: &str) -> PathBuf {
    report_dir(logs_root, run_id, model_name, instance_id).join(REPORT_FILE_NAME)
}

/// Read a report file. A missing file is `Ok(None)`; unparsable content is an error.
pub fn read_report(path: &Path) -> Result<Option<Value>> {
    if !path.is_file() {
        return Ok(None);
    }
    let data = fs::read_to_string(path)?;
    let value = serde_json::from_str(&data).map_err(|source| SmokeError::Report {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(value))
}

/// Pretty-print with two-space indentation, preserving key order.
pub fn format_report(report: &Value) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| report.to_string())
}

/// Typed view over the harness report entry for one instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceReport {
    #[serde(rename = "patch_is_None", default)]
    pub patch_is_none: bool,
    #[serde(default)]
    pub patch_exists: bool,
    #[serde(default)]
    pub patch_successfully_applied: bool,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub tests_status: Option<Value>,
}

impl InstanceReport {
    /// Extract the entry for `instance_id`, accepting both the keyed
    /// (`{"<id>": {...}}`) and the bare layout.
    pub fn from_report(report: &Value, instance_id: &str) -> Option<Self> {
        let entry = report.get(instance_id).unwrap_or(report);
        if entry.get("resolved").is_none() {
            return None;
        }
        serde_json::from_value(entry.clone()).ok()
    }
}
