use super::{read_instances, DatasetContext, DatasetLoader, LocalDataset};
use crate::config::DatasetConfig;
use crate::error::{Result, SmokeError};
use crate::types::BenchmarkInstance;
use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Hugging Face dataset loader.
///
/// Rows are fetched page by page from the datasets-server `rows` endpoint and
/// cached as `<split>.jsonl` under the cache directory, so later runs stay
/// offline. A local directory named after the repo id short-circuits the
/// download.
pub struct HuggingFaceDataset {
    config: DatasetConfig,
    ctx: DatasetContext,
}

#[derive(Debug, Deserialize)]
struct RowsPage {
    #[serde(default)]
    rows: Vec<RowEntry>,
    #[serde(default)]
    num_rows_total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    #[serde(default)]
    row_idx: Option<usize>,
    row: Value,
    #[serde(default)]
    truncated_cells: Vec<String>,
}

impl HuggingFaceDataset {
    pub fn new(config: DatasetConfig, ctx: DatasetContext) -> Self {
        Self { config, ctx }
    }

    fn repo_id(&self) -> String {
        self.config
            .source
            .strip_prefix("huggingface:")
            .unwrap_or(&self.config.source)
            .to_string()
    }

    fn resolve_local_repo(&self) -> Option<PathBuf> {
        let id = self.repo_id();
        let path = PathBuf::from(&id);
        if path.is_dir() {
            return Some(path);
        }
        let relative = self.ctx.root_dir.join(&id);
        if relative.is_dir() {
            return Some(relative);
        }
        None
    }

    /// `<cache>/hf/<owner>_<name>/<split>.jsonl`
    pub fn cache_file(&self) -> PathBuf {
        self.ctx
            .cache_dir
            .join("hf")
            .join(self.repo_id().replace('/', "_"))
            .join(format!("{}.jsonl", self.config.split))
    }

    async fn download(&self, target: &Path) -> Result<usize> {
        let repo_id = self.repo_id();
        let split = &self.config.split;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let token = std::env::var("HF_TOKEN")
            .ok()
            .or_else(|| std::env::var("HUGGINGFACE_TOKEN").ok());
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow!("failed to build client: {e}"))?;
        let url = format!("{}/rows", self.config.endpoint.trim_end_matches('/'));

        info!(repo = %repo_id, split = %split, "downloading dataset rows");

        // Write to a sibling file first so an interrupted download never
        // looks like a complete cache entry.
        let partial = target.with_extension("jsonl.partial");
        let mut out = fs::File::create(&partial).await?;
        let page_size = self.config.page_size;
        let mut offset = 0usize;
        let length = page_size.to_string();
        loop {
            let offset_param = offset.to_string();
            let mut req = client.get(&url).query(&[
                ("dataset", repo_id.as_str()),
                ("config", self.config.config_name.as_str()),
                ("split", split.as_str()),
                ("offset", offset_param.as_str()),
                ("length", length.as_str()),
            ]);
            if let Some(t) = &token {
                req = req.bearer_auth(t);
            }
            let resp = req.send().await?;
            if !resp.status().is_success() {
                return Err(anyhow!(
                    "failed to download dataset {repo_id} split {split}: http {}",
                    resp.status()
                )
                .into());
            }
            let page: RowsPage = resp.json().await?;
            let fetched = page.rows.len();
            if let Some(entry) = page.rows.iter().find(|e| !e.truncated_cells.is_empty()) {
                drop(out);
                let _ = fs::remove_file(&partial).await;
                let row = entry.row_idx.unwrap_or(offset);
                return Err(anyhow!(
                    "row {row} of {repo_id} split {split} has truncated cells: {}",
                    entry.truncated_cells.join(", ")
                )
                .into());
            }
            for entry in page.rows {
                let line = serde_json::to_string(&entry.row)? + "\n";
                out.write_all(line.as_bytes()).await?;
            }
            offset += fetched;
            debug!(offset, total = ?page.num_rows_total, "fetched rows page");

            let exhausted = match page.num_rows_total {
                Some(total) => offset >= total,
                None => fetched < page_size,
            };
            if fetched == 0 || exhausted {
                break;
            }
        }
        out.flush().await?;
        drop(out);
        fs::rename(&partial, target).await?;
        Ok(offset)
    }
}

#[async_trait]
impl DatasetLoader for HuggingFaceDataset {
    async fn load(&self) -> Result<Vec<BenchmarkInstance>> {
        if let Some(local) = self.resolve_local_repo() {
            debug!(path = %local.display(), "using local dataset directory");
            let config = DatasetConfig {
                source: local.to_string_lossy().to_string(),
                ..self.config.clone()
            };
            return LocalDataset::new(config, self.ctx.clone()).load().await;
        }

        let target = self.cache_file();
        if fs::try_exists(&target).await? {
            debug!(path = %target.display(), "dataset cache hit");
        } else {
            let rows = self
                .download(&target)
                .await
                .map_err(|e| SmokeError::dataset(self.repo_id(), e))?;
            info!(rows, path = %target.display(), "cached dataset split");
        }
        read_instances(&target).await
    }
}
