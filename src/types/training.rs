//! Training stage: `GET /api/models/models` (query parameters)

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::Contract;

/// Models the backend knows how to train
pub const AVAILABLE_MODELS: &[&str] = &[
    "Logistic Regression",
    "K-Neighbors Classifier",
    "Decision Tree Classifier",
    "Gaussian Naive Bayes",
    "Random Forest",
    "Support Vector Machine",
    "Decision Tree Rule-based",
];

/// Training options, sent as query parameters.
/// Also the `[training]` section of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainOptions {
    /// Target column. Falls back to the uploaded dataset's target when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default)]
    pub optimize: bool,
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    #[serde(default = "default_random_state")]
    pub random_state: u64,
}

fn default_models() -> Vec<String> {
    AVAILABLE_MODELS.iter().map(|m| m.to_string()).collect()
}

fn default_test_size() -> f64 {
    0.2
}

fn default_random_state() -> u64 {
    42
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            target: None,
            models: default_models(),
            optimize: false,
            test_size: default_test_size(),
            random_state: default_random_state(),
        }
    }
}

impl TrainOptions {
    /// Query parameters, excluding `session_id`. Each model is its own
    /// repeated `models` parameter.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(target) = self.target.as_deref().filter(|t| !t.is_empty()) {
            query.push(("target".to_string(), target.to_string()));
        }
        for model in &self.models {
            query.push(("models".to_string(), model.clone()));
        }
        query.push(("optimize".to_string(), self.optimize.to_string()));
        query.push(("test_size".to_string(), self.test_size.to_string()));
        query.push(("random_state".to_string(), self.random_state.to_string()));
        query
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.models.is_empty() {
            return Err("select at least one model to train".to_string());
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(format!(
                "test_size must be between 0 and 1 (exclusive), got {}",
                self.test_size
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrainingResponse {
    pub status: String,
    pub session_id: Uuid,
    pub model_results: ModelResults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelResults {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub hyperparameters: Map<String, Value>,
    pub models: Vec<ModelResult>,
    /// Hyperparameter-tuned variants, present when `optimize` was requested
    #[serde(default, alias = "Tuned-Models", skip_serializing_if = "IndexMap::is_empty")]
    pub tuned_models: IndexMap<String, ModelMetrics>,
    /// The backend's own pick
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_model: Option<BestModel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelResult {
    pub name: String,
    pub metrics: ModelMetrics,
}

/// Metric name to value, in the order the backend reported them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ModelMetrics(pub IndexMap<String, Value>);

impl ModelMetrics {
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.0
            .get(metric)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
    }

    pub fn f1(&self) -> Option<f64> {
        self.get("f1_score").or_else(|| self.get("f1"))
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.get("accuracy")
    }

    /// Comparison score: F1, falling back to accuracy
    pub fn score(&self) -> Option<(ScoreMetric, f64)> {
        self.f1()
            .map(|v| (ScoreMetric::F1, v))
            .or_else(|| self.accuracy().map(|v| (ScoreMetric::Accuracy, v)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BestModel {
    pub name: String,
    #[serde(default)]
    pub reason: String,
    pub f1_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMetric {
    F1,
    Accuracy,
}

/// Client-side pick among returned model results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelChoice {
    pub name: String,
    pub metric: ScoreMetric,
    pub score: f64,
}

/// Pick the model with the highest score. The first model seen with the
/// maximum keeps the title; models without any usable metric are skipped.
pub fn select_best_model<'a, I>(candidates: I) -> Option<ModelChoice>
where
    I: IntoIterator<Item = (&'a str, &'a ModelMetrics)>,
{
    let mut best: Option<ModelChoice> = None;

    for (name, metrics) in candidates {
        let Some((metric, score)) = metrics.score() else {
            continue;
        };
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(ModelChoice {
                name: name.to_string(),
                metric,
                score,
            });
        }
    }

    best
}

impl TrainingResponse {
    /// Tuned variants suffixed " (Tuned)", then base models in response order.
    /// A tuned variant that ties its base model is ranked first.
    pub fn all_results(&self) -> Vec<(String, &ModelMetrics)> {
        let tuned = self
            .model_results
            .tuned_models
            .iter()
            .map(|(name, metrics)| (format!("{} (Tuned)", name), metrics));
        let base = self
            .model_results
            .models
            .iter()
            .map(|m| (m.name.clone(), &m.metrics));
        tuned.chain(base).collect()
    }

    pub fn best_model(&self) -> Option<ModelChoice> {
        let results = self.all_results();
        select_best_model(results.iter().map(|(name, m)| (name.as_str(), *m)))
    }
}

impl Contract for TrainingResponse {
    fn session_id(&self) -> Option<Uuid> {
        Some(self.session_id)
    }

    fn validate(&self) -> Result<(), String> {
        if self.model_results.models.is_empty() && self.model_results.tuned_models.is_empty() {
            return Err("model_results contains no trained models".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::decode;
    use serde_json::json;

    fn metrics(value: Value) -> ModelMetrics {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_highest_f1_wins() {
        let rf = metrics(json!({"f1_score": 0.91}));
        let lr = metrics(json!({"f1_score": 0.87}));
        let best = select_best_model([("Random Forest", &rf), ("Logistic Regression", &lr)]).unwrap();
        assert_eq!(best.name, "Random Forest");
        assert_eq!(best.metric, ScoreMetric::F1);
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        let a = metrics(json!({"f1_score": 0.9}));
        let b = metrics(json!({"f1_score": 0.9}));
        let best = select_best_model([("A", &a), ("B", &b)]).unwrap();
        assert_eq!(best.name, "A");
    }

    #[test]
    fn test_accuracy_fallback() {
        let a = metrics(json!({"accuracy": 0.8}));
        let b = metrics(json!({"f1": 0.85, "accuracy": 0.7}));
        let c = metrics(json!({"precision": 0.99}));
        let best = select_best_model([("A", &a), ("B", &b), ("C", &c)]).unwrap();
        assert_eq!(best.name, "B");

        let best = select_best_model([("A", &a), ("C", &c)]).unwrap();
        assert_eq!(best.name, "A");
        assert_eq!(best.metric, ScoreMetric::Accuracy);

        assert!(select_best_model([("C", &c)]).is_none());
    }

    #[test]
    fn test_train_query_repeats_models() {
        let options = TrainOptions {
            target: Some("species".to_string()),
            models: vec!["Random Forest".to_string(), "Gaussian Naive Bayes".to_string()],
            optimize: true,
            ..Default::default()
        };
        assert_eq!(
            options.to_query(),
            vec![
                ("target".to_string(), "species".to_string()),
                ("models".to_string(), "Random Forest".to_string()),
                ("models".to_string(), "Gaussian Naive Bayes".to_string()),
                ("optimize".to_string(), "true".to_string()),
                ("test_size".to_string(), "0.2".to_string()),
                ("random_state".to_string(), "42".to_string()),
            ]
        );
    }

    #[test]
    fn test_train_options_validation() {
        assert!(TrainOptions::default().validate().is_ok());
        let options = TrainOptions {
            models: vec![],
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_decode_with_tuned_models() {
        let body = json!({
            "status": "success",
            "session_id": "11111111-1111-1111-1111-111111111111",
            "model_results": {
                "timestamp": "2024-06-01T12:00:00",
                "hyperparameters": {},
                "models": [
                    {"name": "Logistic Regression", "metrics": {"accuracy": 0.9, "f1_score": 0.88}},
                    {"name": "Random Forest", "metrics": {"accuracy": 0.93, "f1_score": 0.92}}
                ],
                "Tuned-Models": {
                    "Random Forest": {"accuracy": 0.95, "f1_score": 0.92}
                },
                "best_model": {"name": "Random Forest", "reason": "Highest F1", "f1_score": 0.92}
            }
        });

        let training: TrainingResponse = decode(body).unwrap();
        let results = training.all_results();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, "Random Forest (Tuned)");
        assert_eq!(results[1].0, "Logistic Regression");
        // Tuned variant ties its base model and is visited first
        assert_eq!(training.best_model().unwrap().name, "Random Forest (Tuned)");
        assert_eq!(
            training.model_results.best_model.as_ref().unwrap().reason,
            "Highest F1"
        );
    }

    #[test]
    fn test_empty_results_violate_contract() {
        let body = json!({
            "status": "success",
            "session_id": "11111111-1111-1111-1111-111111111111",
            "model_results": {"models": []}
        });
        assert!(decode::<TrainingResponse>(body).is_err());
    }
}
