//! Configuration loading and models for swesmoke.
//!
//! Configuration is loaded via figment from multiple layers:
//! 1. Built-in defaults
//! 2. YAML file (optional, `${VAR}` / `${VAR:-default}` interpolated)
//! 3. Environment variables (SWESMOKE_ prefix, __ as nested separator)
//! 4. CLI overrides (passed programmatically)

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Figment(#[from] figment::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// DEFAULTS (all in one place)
// ============================================================================

fn default_dataset_name() -> String {
    "SWE-Gym/SWE-Gym".to_string()
}

fn default_dataset_source() -> String {
    "huggingface:SWE-Gym/SWE-Gym".to_string()
}

fn default_split() -> String {
    "train".to_string()
}

fn default_hf_config_name() -> String {
    "default".to_string()
}

fn default_hf_endpoint() -> String {
    "https://datasets-server.huggingface.co".to_string()
}

fn default_cache_directory() -> String {
    "~/.cache/swesmoke/datasets".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_program() -> String {
    "python".to_string()
}

fn default_program_args() -> Vec<String> {
    vec!["-m".to_string(), "swebench.harness.run_evaluation".to_string()]
}

fn default_modal() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    1800
}

fn default_model_name() -> String {
    "test_model".to_string()
}

fn default_max_workers() -> usize {
    1
}

fn default_logs_directory() -> String {
    "logs".to_string()
}

// ============================================================================
// DATASET CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_dataset_name")]
    pub name: String,
    /// `huggingface:<repo>`, `local:<path>` or a bare path.
    #[serde(default = "default_dataset_source")]
    pub source: String,
    #[serde(default = "default_split")]
    pub split: String,
    /// Hugging Face dataset config (subset) name.
    #[serde(default = "default_hf_config_name")]
    pub config_name: String,
    #[serde(default = "default_hf_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_cache_directory")]
    pub cache_directory: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            name: default_dataset_name(),
            source: default_dataset_source(),
            split: default_split(),
            config_name: default_hf_config_name(),
            endpoint: default_hf_endpoint(),
            cache_directory: default_cache_directory(),
            page_size: default_page_size(),
        }
    }
}

// ============================================================================
// EVALUATOR CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_program_args")]
    pub args: Vec<String>,
    /// Ask the harness to execute in the remote Modal sandbox.
    #[serde(default = "default_modal")]
    pub modal: bool,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub work_dir: Option<String>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_program_args(),
            modal: default_modal(),
            timeout_seconds: default_timeout_seconds(),
            model_name: default_model_name(),
            max_workers: default_max_workers(),
            env: HashMap::new(),
            work_dir: None,
        }
    }
}

// ============================================================================
// OUTPUT CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_logs_directory")]
    pub logs_directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            logs_directory: default_logs_directory(),
        }
    }
}

// ============================================================================
// TOP-LEVEL CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmokeConfig {
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl SmokeConfig {
    /// Resolve the dataset cache directory, expanding ~ to home.
    pub fn cache_dir(&self) -> PathBuf {
        expand_home(&self.dataset.cache_directory)
    }

    pub fn logs_dir(&self) -> PathBuf {
        expand_home(&self.output.logs_directory)
    }

    /// Root the harness writes `<run_id>/...` under. A relative logs directory
    /// lives inside the evaluator's `work_dir` when one is set.
    pub fn report_root(&self) -> PathBuf {
        let logs = self.logs_dir();
        let work_dir = self.evaluator.work_dir.as_deref().filter(|d| !d.is_empty());
        match work_dir {
            Some(dir) if logs.is_relative() => expand_home(dir).join(logs),
            _ => logs,
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

// ============================================================================
// CLI OVERRIDES
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modal: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs_dir: Option<String>,
}

impl ConfigOverrides {
    fn is_empty(&self) -> bool {
        self.dataset_source.is_none()
            && self.split.is_none()
            && self.cache_dir.is_none()
            && self.timeout_seconds.is_none()
            && self.modal.is_none()
            && self.logs_dir.is_none()
    }

    /// Nested override document in the same shape as [`SmokeConfig`].
    fn to_value(&self) -> Value {
        let mut dataset = Map::new();
        if let Some(s) = &self.dataset_source {
            dataset.insert("source".into(), json!(s));
        }
        if let Some(s) = &self.split {
            dataset.insert("split".into(), json!(s));
        }
        if let Some(c) = &self.cache_dir {
            dataset.insert("cache_directory".into(), json!(c));
        }

        let mut evaluator = Map::new();
        if let Some(t) = self.timeout_seconds {
            evaluator.insert("timeout_seconds".into(), json!(t));
        }
        if let Some(m) = self.modal {
            evaluator.insert("modal".into(), json!(m));
        }

        let mut output = Map::new();
        if let Some(l) = &self.logs_dir {
            output.insert("logs_directory".into(), json!(l));
        }

        let mut root = Map::new();
        for (key, section) in [("dataset", dataset), ("evaluator", evaluator), ("output", output)]
        {
            if !section.is_empty() {
                root.insert(key.into(), Value::Object(section));
            }
        }
        Value::Object(root)
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Load configuration from an optional YAML file.
///
/// `None` skips the file layer entirely; a path that does not exist is an error.
pub fn load_config(path: Option<&Path>) -> Result<SmokeConfig, ConfigError> {
    load_config_with_overrides(path, ConfigOverrides::default())
}

pub fn load_config_with_overrides(
    path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<SmokeConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(SmokeConfig::default()));

    if let Some(path) = path {
        let contents = std::fs::read_to_string(path)?;
        let interpolated = interpolate_env_vars(&contents);
        figment = figment.merge(Yaml::string(&interpolated));
    }

    figment = figment.merge(Env::prefixed("SWESMOKE_").split("__"));

    if !overrides.is_empty() {
        figment = figment.merge(Serialized::defaults(overrides.to_value()));
    }

    let cfg: SmokeConfig = figment.extract()?;
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn interpolate_env_vars(input: &str) -> String {
    use once_cell::sync::Lazy;
    use regex::Regex;
    use std::env;

    static ENV_VAR_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("valid regex")
    });

    ENV_VAR_RE
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_val = caps.get(2).map(|m| m.as_str());
            match env::var(var_name) {
                Ok(val) => val,
                Err(_) => default_val.unwrap_or("").to_string(),
            }
        })
        .to_string()
}

fn validate_config(cfg: &SmokeConfig) -> Result<(), ConfigError> {
    if cfg.dataset.source.trim().is_empty() {
        return Err(ConfigError::Invalid("dataset source must not be empty".into()));
    }
    if cfg.dataset.split.trim().is_empty() {
        return Err(ConfigError::Invalid("dataset split must not be empty".into()));
    }
    if cfg.dataset.page_size == 0 {
        return Err(ConfigError::Invalid("dataset page_size must be positive".into()));
    }
    if cfg.evaluator.program.trim().is_empty() {
        return Err(ConfigError::Invalid("evaluator program must not be empty".into()));
    }
    if cfg.evaluator.model_name.trim().is_empty() {
        return Err(ConfigError::Invalid("evaluator model_name must not be empty".into()));
    }
    if cfg.evaluator.timeout_seconds == 0 {
        return Err(ConfigError::Invalid("evaluator timeout_seconds must be positive".into()));
    }
    Ok(())
}
