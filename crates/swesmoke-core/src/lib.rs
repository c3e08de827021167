//! Core library for swesmoke, a single-instance smoke test for SWE-bench
//! style evaluation pipelines.
//!
//! - [`config`]: Configuration loading and validation
//! - [`datasets`]: Dataset loaders (HuggingFace, local JSON/JSONL)
//! - [`patch`]: Patch file resolution with a built-in fallback
//! - [`evaluator`]: Delegated evaluation through the harness CLI
//! - [`report`]: Report lookup and formatting
//! - [`reporter`]: Events for console output
//! - [`smoke`]: The end-to-end smoke test
//! - [`error`]: Unified error types
//!
//! # Flow
//!
//! Load the dataset, find one instance, build a prediction from a patch file,
//! hand it to the evaluator, then read back `report.json` if one was written.

// Foundation modules (no internal dependencies)
pub mod config;
pub mod error;
pub mod types;

// Inputs
pub mod datasets;
pub mod patch;

// Execution and results
pub mod evaluator;
pub mod report;
pub mod reporter;
pub mod smoke;

pub use error::{Result, SmokeError};
pub use smoke::{EvaluationSummary, SmokeOutcome, SmokeParams, SmokeTest};
