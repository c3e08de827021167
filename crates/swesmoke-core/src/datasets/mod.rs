//! Dataset loaders.

use crate::config::DatasetConfig;
use crate::error::{Result, SmokeError};
use crate::types::BenchmarkInstance;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

mod local;
pub use local::LocalDataset;

mod huggingface;
pub use huggingface::HuggingFaceDataset;

/// Context passed to dataset loaders for path resolution and caching.
#[derive(Debug, Clone)]
pub struct DatasetContext {
    pub root_dir: PathBuf,
    pub cache_dir: PathBuf,
}

#[async_trait]
pub trait DatasetLoader: Send + Sync {
    /// Load every instance of the configured split, in dataset order.
    async fn load(&self) -> Result<Vec<BenchmarkInstance>>;
}

pub fn get_dataset_loader(config: DatasetConfig, ctx: DatasetContext) -> Box<dyn DatasetLoader> {
    if config.source.starts_with("huggingface:") {
        Box::new(HuggingFaceDataset::new(config, ctx))
    } else {
        Box::new(LocalDataset::new(config, ctx))
    }
}

/// First instance whose id equals `instance_id`.
pub fn find_instance<'a>(
    instances: &'a [BenchmarkInstance],
    instance_id: &str,
) -> Option<&'a BenchmarkInstance> {
    instances.iter().find(|i| i.instance_id == instance_id)
}

/// Resolve a path relative to the dataset context root if not absolute.
fn resolve_path(path_str: &str, root: &Path) -> PathBuf {
    let p = PathBuf::from(path_str);
    if p.is_absolute() {
        p
    } else {
        root.join(p)
    }
}

/// Records without a string `instance_id` are skipped.
fn parse_instance(record: Value) -> Option<BenchmarkInstance> {
    let id = record.get("instance_id")?.as_str()?.to_string();
    match serde_json::from_value(record) {
        Ok(instance) => Some(instance),
        Err(e) => {
            warn!(instance_id = %id, error = %e, "skipping malformed dataset record");
            None
        }
    }
}

/// Parse a `.json` array file or a JSONL file.
async fn read_instances(path: &Path) -> Result<Vec<BenchmarkInstance>> {
    let data = tokio::fs::read_to_string(path).await?;
    let is_json_array = path.extension().is_some_and(|ext| ext == "json");

    let mut instances = Vec::new();
    if is_json_array {
        let records: Vec<Value> = serde_json::from_str(&data)?;
        instances.extend(records.into_iter().filter_map(parse_instance));
    } else {
        for (idx, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(record) => instances.extend(parse_instance(record)),
                Err(e) => {
                    return Err(SmokeError::dataset(
                        path.display().to_string(),
                        format!("line {}: {e}", idx + 1),
                    ))
                }
            }
        }
    }
    debug!(path = %path.display(), count = instances.len(), "read dataset file");
    Ok(instances)
}
