//! Exploratory analysis stage: `POST /api/eda/analyze`

use std::collections::BTreeMap;

use base64::Engine;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::Contract;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EdaResponse {
    pub status: String,
    pub session_id: Uuid,
    pub eda_report: EdaReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EdaReport {
    /// Column name to missing-value count (or per-column detail)
    pub missing_values: Map<String, Value>,
    pub numerical_summary: Map<String, Value>,
    pub categorical_summary: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outliers: Option<OutlierReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlations: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualizations: Option<Visualizations>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutlierReport {
    pub iqr_method: Map<String, Value>,
    pub zscore_method: Map<String, Value>,
}

/// Base64-encoded PNG images rendered by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Visualizations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_heatmap: Option<String>,
    /// Column name to distribution plot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distributions: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_distribution: Option<String>,
}

impl EdaReport {
    /// Columns with at least one missing value, with their counts
    pub fn columns_with_missing(&self) -> Vec<(&str, u64)> {
        self.missing_values
            .iter()
            .filter_map(|(column, count)| {
                let count = count
                    .as_u64()
                    .or_else(|| count.get("count").and_then(Value::as_u64))?;
                (count > 0).then_some((column.as_str(), count))
            })
            .collect()
    }
}

impl Visualizations {
    /// Every image as `(file stem, base64 payload)`
    pub fn images(&self) -> Vec<(String, &str)> {
        let mut images = Vec::new();
        if let Some(heatmap) = &self.correlation_heatmap {
            images.push(("correlation_heatmap".to_string(), heatmap.as_str()));
        }
        if let Some(class_dist) = &self.class_distribution {
            images.push(("class_distribution".to_string(), class_dist.as_str()));
        }
        if let Some(distributions) = &self.distributions {
            for (column, image) in distributions {
                images.push((format!("distribution_{}", sanitize(column)), image.as_str()));
            }
        }
        images
    }
}

/// Decode a base64 image, accepting an optional `data:image/...;base64,` prefix
pub fn decode_image(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let data = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };
    base64::engine::general_purpose::STANDARD.decode(data.trim())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

impl Contract for EdaResponse {
    fn session_id(&self) -> Option<Uuid> {
        Some(self.session_id)
    }
}
