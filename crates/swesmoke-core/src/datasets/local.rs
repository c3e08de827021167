use super::{read_instances, resolve_path, DatasetContext, DatasetLoader};
use crate::config::DatasetConfig;
use crate::error::{Result, SmokeError};
use crate::types::BenchmarkInstance;
use async_trait::async_trait;
use globwalk::GlobWalkerBuilder;
use std::path::PathBuf;

/// Loads instances from a JSON/JSONL file or a directory of JSONL files.
pub struct LocalDataset {
    config: DatasetConfig,
    root: PathBuf,
}

impl LocalDataset {
    pub fn new(config: DatasetConfig, ctx: DatasetContext) -> Self {
        Self {
            config,
            root: ctx.root_dir,
        }
    }

    fn source_path(&self) -> PathBuf {
        let source = self
            .config
            .source
            .strip_prefix("local:")
            .unwrap_or(&self.config.source);
        resolve_path(source, &self.root)
    }

    fn files(&self) -> Result<Vec<PathBuf>> {
        let path = self.source_path();
        if !path.is_dir() {
            if !path.exists() {
                return Err(SmokeError::dataset(
                    self.config.name.clone(),
                    format!("no such file: {}", path.display()),
                ));
            }
            return Ok(vec![path]);
        }

        let walker = GlobWalkerBuilder::from_patterns(&path, &["*.jsonl"])
            .build()
            .map_err(|e| SmokeError::Internal(e.into()))?;
        let mut files: Vec<PathBuf> = walker
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();

        // Prefer the split-named file when the directory holds several.
        let split = &self.config.split;
        let filtered: Vec<PathBuf> = files
            .iter()
            .filter(|p| {
                p.file_stem()
                    .and_then(|f| f.to_str())
                    .map(|stem| stem == split)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        if !filtered.is_empty() {
            files = filtered;
        }

        if files.is_empty() {
            return Err(SmokeError::dataset(
                self.config.name.clone(),
                format!("no JSONL files found in {}", path.display()),
            ));
        }
        Ok(files)
    }
}

#[async_trait]
impl DatasetLoader for LocalDataset {
    async fn load(&self) -> Result<Vec<BenchmarkInstance>> {
        let mut instances = Vec::new();
        for file in self.files()? {
            instances.extend(read_instances(&file).await?);
        }
        Ok(instances)
    }
}
