//! Tests for the datasets module.

use axum::{extract::Query, extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use swesmoke_core::config::DatasetConfig;
use swesmoke_core::datasets::{
    find_instance, DatasetContext, DatasetLoader, HuggingFaceDataset, LocalDataset,
};
use tempfile::tempdir;
use tokio::net::TcpListener;

fn ctx(root: &Path) -> DatasetContext {
    DatasetContext {
        root_dir: root.to_path_buf(),
        cache_dir: root.join("cache"),
    }
}

fn local_config(source: &str) -> DatasetConfig {
    DatasetConfig {
        name: "test".into(),
        source: source.into(),
        ..DatasetConfig::default()
    }
}

#[tokio::test]
async fn local_jsonl_loads_records_in_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("instances.jsonl");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "{}",
        json!({"instance_id": "a__a-1", "problem_statement": "first", "repo": "a/a"})
    )
    .unwrap();
    writeln!(file).unwrap();
    writeln!(file, "{}", json!({"problem_statement": "no id"})).unwrap();
    writeln!(
        file,
        "{}",
        json!({"instance_id": "b__b-2", "problem_statement": "second"})
    )
    .unwrap();

    let loader = LocalDataset::new(local_config("local:instances.jsonl"), ctx(dir.path()));
    let instances = loader.load().await.unwrap();
    assert_eq!(instances.len(), 2);
    assert_eq!(instances[0].instance_id, "a__a-1");
    assert_eq!(instances[0].fields["repo"], "a/a");
    assert_eq!(instances[1].problem_statement, "second");
}

#[tokio::test]
async fn local_json_array_loads() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dataset.json");
    std::fs::write(
        &path,
        json!([
            {"instance_id": "x", "problem_statement": "px"},
            {"instance_id": "y", "problem_statement": "py"}
        ])
        .to_string(),
    )
    .unwrap();

    let loader = LocalDataset::new(
        local_config(&path.to_string_lossy()),
        ctx(dir.path()),
    );
    let instances = loader.load().await.unwrap();
    assert_eq!(find_instance(&instances, "y").unwrap().problem_statement, "py");
}

#[tokio::test]
async fn local_directory_prefers_split_file() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(
        data.join("train.jsonl"),
        json!({"instance_id": "train-1"}).to_string(),
    )
    .unwrap();
    std::fs::write(
        data.join("test.jsonl"),
        json!({"instance_id": "test-1"}).to_string(),
    )
    .unwrap();

    let loader = LocalDataset::new(local_config("data"), ctx(dir.path()));
    let instances = loader.load().await.unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].instance_id, "train-1");
}

#[tokio::test]
async fn local_missing_file_is_dataset_error() {
    let dir = tempdir().unwrap();
    let loader = LocalDataset::new(local_config("missing.jsonl"), ctx(dir.path()));
    let err = loader.load().await.unwrap_err();
    assert!(err.to_string().contains("failed to load dataset test"));
}

#[derive(Clone)]
struct RowsServer {
    rows: Arc<Vec<Value>>,
    truncated_row: Option<usize>,
    hits: Arc<AtomicUsize>,
}

async fn rows_handler(
    State(state): State<RowsServer>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let offset: usize = params["offset"].parse().unwrap();
    let length: usize = params["length"].parse().unwrap();
    let page: Vec<Value> = state
        .rows
        .iter()
        .enumerate()
        .skip(offset)
        .take(length)
        .map(|(idx, row)| {
            let truncated: Vec<&str> = if state.truncated_row == Some(idx) {
                vec!["test_patch"]
            } else {
                vec![]
            };
            json!({"row_idx": idx, "row": row, "truncated_cells": truncated})
        })
        .collect();
    Json(json!({
        "rows": page,
        "num_rows_total": state.rows.len(),
        "num_rows_per_page": length,
        "partial": false
    }))
}

async fn spawn_rows_server(rows: Vec<Value>) -> (String, Arc<AtomicUsize>) {
    spawn_rows_server_with(rows, None).await
}

async fn spawn_rows_server_with(
    rows: Vec<Value>,
    truncated_row: Option<usize>,
) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let state = RowsServer {
        rows: Arc::new(rows),
        truncated_row,
        hits: hits.clone(),
    };
    let app = Router::new()
        .route("/rows", get(rows_handler))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), hits)
}

fn hf_config(endpoint: &str) -> DatasetConfig {
    DatasetConfig {
        name: "SWE-Gym/SWE-Gym".into(),
        source: "huggingface:SWE-Gym/SWE-Gym".into(),
        endpoint: endpoint.into(),
        page_size: 2,
        ..DatasetConfig::default()
    }
}

#[tokio::test]
async fn huggingface_pages_rows_and_caches_split() {
    let rows: Vec<Value> = (0..5)
        .map(|i| json!({"instance_id": format!("repo__repo-{i}"), "problem_statement": format!("p{i}")}))
        .collect();
    let (endpoint, hits) = spawn_rows_server(rows).await;

    let dir = tempdir().unwrap();
    let loader = HuggingFaceDataset::new(hf_config(&endpoint), ctx(dir.path()));
    let instances = loader.load().await.unwrap();
    assert_eq!(instances.len(), 5);
    assert_eq!(instances[4].instance_id, "repo__repo-4");
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    let cache_file = loader.cache_file();
    assert!(cache_file.ends_with("hf/SWE-Gym_SWE-Gym/train.jsonl"));
    assert!(cache_file.is_file());

    // Second load is served from the cache.
    let again = loader.load().await.unwrap();
    assert_eq!(again, instances);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn huggingface_http_error_is_dataset_error() {
    let dir = tempdir().unwrap();
    // Nothing listens on the discard port.
    let loader = HuggingFaceDataset::new(hf_config("http://127.0.0.1:9"), ctx(dir.path()));
    let err = loader.load().await.unwrap_err();
    assert!(err.to_string().contains("failed to load dataset SWE-Gym/SWE-Gym"));
    assert!(!loader.cache_file().exists());
}

#[tokio::test]
async fn huggingface_truncated_cells_are_rejected() {
    let rows: Vec<Value> = (0..3)
        .map(|i| {
            json!({
                "instance_id": format!("repo__repo-{i}"),
                "test_patch": "diff --git a/x b/x\n@@ -1,"
            })
        })
        .collect();
    let (endpoint, _hits) = spawn_rows_server_with(rows, Some(2)).await;

    let dir = tempdir().unwrap();
    let loader = HuggingFaceDataset::new(hf_config(&endpoint), ctx(dir.path()));
    let err = loader.load().await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("failed to load dataset SWE-Gym/SWE-Gym"), "{msg}");
    assert!(msg.contains("row 2"), "{msg}");
    assert!(msg.contains("truncated cells: test_patch"), "{msg}");

    let cache_file = loader.cache_file();
    assert!(!cache_file.exists());
    assert!(!cache_file.with_extension("jsonl.partial").exists());
}
