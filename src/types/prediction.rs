//! Prediction with the trained best model.
//!
//! `GET /api/predict/features` describes the inputs, `POST /api/predict/single`
//! scores one row. Not a wizard stage: both only need a session with a
//! trained model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::Contract;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FeatureInfo {
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub feature_types: Map<String, Value>,
    #[serde(default)]
    pub class_labels: Vec<Value>,
    #[serde(default = "unknown_model")]
    pub model_name: String,
}

fn unknown_model() -> String {
    "Unknown".to_string()
}

impl Contract for FeatureInfo {}

/// Body of the predict call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub features: Map<String, Value>,
}

impl PredictionRequest {
    /// Build from `name=value` pairs. Values that parse as numbers are sent
    /// as numbers, everything else as strings.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut features = Map::new();
        for pair in pairs {
            let (name, raw) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", pair))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(format!("missing feature name in '{}'", pair));
            }
            features.insert(name.to_string(), parse_feature_value(raw.trim()));
        }
        Ok(Self { features })
    }

    /// Feature names the model expects that are not in this request
    pub fn missing_features<'a>(&self, info: &'a FeatureInfo) -> Vec<&'a str> {
        info.feature_names
            .iter()
            .filter(|name| !self.features.contains_key(name.as_str()))
            .map(String::as_str)
            .collect()
    }
}

fn parse_feature_value(raw: &str) -> Value {
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(|n| match raw.parse::<i64>() {
            Ok(i) => Value::from(i),
            Err(_) => Value::Number(n),
        })
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PredictionResponse {
    pub prediction: Value,
    pub predicted_label: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub probabilities: Option<Vec<f64>>,
    #[serde(default = "unknown_model")]
    pub model_name: String,
    #[serde(default)]
    pub class_labels: Vec<Value>,
}

impl PredictionResponse {
    /// `(label, probability)` pairs when the model reports per-class probabilities
    pub fn class_probabilities(&self) -> Vec<(String, f64)> {
        let Some(probabilities) = &self.probabilities else {
            return Vec::new();
        };
        self.class_labels
            .iter()
            .zip(probabilities)
            .map(|(label, p)| {
                let label = match label {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (label, *p)
            })
            .collect()
    }
}

impl Contract for PredictionResponse {
    fn validate(&self) -> Result<(), String> {
        if let Some(confidence) = self.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(format!("confidence {} is outside [0, 1]", confidence));
            }
        }
        Ok(())
    }
}
