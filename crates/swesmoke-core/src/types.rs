//! Shared data types for swesmoke.

use crate::error::{Result, SmokeError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One benchmark record. Fields other than the id and problem statement are
/// carried through untouched for the evaluator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BenchmarkInstance {
    pub instance_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub problem_statement: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl BenchmarkInstance {
    /// First `max_chars` characters of the problem statement.
    pub fn problem_preview(&self, max_chars: usize) -> &str {
        match self.problem_statement.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.problem_statement[..idx],
            None => &self.problem_statement,
        }
    }
}

/// A candidate patch for one instance, keyed the way the SWE-bench harness expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prediction {
    pub instance_id: String,
    pub model_name_or_path: String,
    pub model_patch: String,
}

impl Prediction {
    pub fn new(
        instance_id: impl Into<String>,
        model_name: impl Into<String>,
        model_patch: impl Into<String>,
    ) -> Result<Self> {
        let instance_id = instance_id.into();
        let model_name_or_path = model_name.into();
        if instance_id.trim().is_empty() {
            return Err(SmokeError::InvalidPrediction("instance_id is empty".into()));
        }
        if model_name_or_path.trim().is_empty() {
            return Err(SmokeError::InvalidPrediction("model name is empty".into()));
        }
        Ok(Self {
            instance_id,
            model_name_or_path,
            model_patch: model_patch.into(),
        })
    }
}

pub type Predictions = BTreeMap<String, Prediction>;

/// Everything handed to an [`Evaluator`](crate::evaluator::Evaluator) for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    pub predictions: Predictions,
    pub instances: Vec<BenchmarkInstance>,
    pub full_dataset: Vec<BenchmarkInstance>,
    pub run_id: String,
    pub timeout_seconds: u64,
}

impl EvaluationRequest {
    /// Request covering exactly one instance.
    ///
    /// The prediction key, the prediction's `instance_id` and both dataset
    /// sequences all refer to `instance`.
    pub fn single(
        instance: BenchmarkInstance,
        prediction: Prediction,
        run_id: impl Into<String>,
        timeout_seconds: u64,
    ) -> Result<Self> {
        if prediction.instance_id != instance.instance_id {
            return Err(SmokeError::InvalidPrediction(format!(
                "prediction for {} does not match instance {}",
                prediction.instance_id, instance.instance_id
            )));
        }
        let mut predictions = Predictions::new();
        predictions.insert(instance.instance_id.clone(), prediction);
        let instances = vec![instance];
        Ok(Self {
            predictions,
            full_dataset: instances.clone(),
            instances,
            run_id: run_id.into(),
            timeout_seconds,
        })
    }

    pub fn instance_ids(&self) -> Vec<&str> {
        self.instances
            .iter()
            .map(|i| i.instance_id.as_str())
            .collect()
    }
}
