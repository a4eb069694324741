//! Preprocessing stage: `POST /api/preprocess/preprocess` (query parameters)

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{Contract, PreviewRow};

/// Preprocessing options, sent as query parameters.
/// Also the `[preprocessing]` section of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessOptions {
    #[serde(default = "default_missing_strategy")]
    pub missing_strategy: String,
    #[serde(default = "default_outlier_method")]
    pub outlier_method: String,
    #[serde(default = "default_scaling_method")]
    pub scaling_method: String,
    #[serde(default = "default_encoding_method")]
    pub encoding_method: String,
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    /// Fill value, only meaningful with the "Constant" missing strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impute_constant: Option<String>,
    /// Additional backend options passed through verbatim
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<(String, String)>,
}

fn default_missing_strategy() -> String {
    "Mean".to_string()
}

fn default_outlier_method() -> String {
    "Remove".to_string()
}

fn default_scaling_method() -> String {
    "Standard".to_string()
}

fn default_encoding_method() -> String {
    "OneHot".to_string()
}

fn default_test_size() -> f64 {
    0.2
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            missing_strategy: default_missing_strategy(),
            outlier_method: default_outlier_method(),
            scaling_method: default_scaling_method(),
            encoding_method: default_encoding_method(),
            test_size: default_test_size(),
            impute_constant: None,
            extra: Vec::new(),
        }
    }
}

impl PreprocessOptions {
    /// Query parameters, excluding `session_id`. Empty values are omitted.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            ("missing_strategy".to_string(), self.missing_strategy.clone()),
            ("outlier_method".to_string(), self.outlier_method.clone()),
            ("scaling_method".to_string(), self.scaling_method.clone()),
            ("encoding_method".to_string(), self.encoding_method.clone()),
            ("test_size".to_string(), self.test_size.to_string()),
        ];
        if let Some(constant) = self.impute_constant.as_deref().filter(|c| !c.is_empty()) {
            query.push(("impute_constant".to_string(), constant.to_string()));
        }
        query.extend(self.extra.iter().cloned());
        query.retain(|(_, value)| !value.is_empty());
        query
    }

    pub fn validate(&self) -> Result<(), String> {
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
pub struct PreprocessResponse {
    pub status: String,
    pub session_id: Uuid,
    #[serde(default)]
    pub preprocessing_params: Map<String, Value>,
    /// `[rows, columns]` before cleaning
    pub original_shape: [u64; 2],
    /// `[rows, columns]` after cleaning
    pub cleaned_shape: [u64; 2],
    pub metadata: PreprocessMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_rows: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_rows: Option<u64>,
    /// Train/test split preview
    #[serde(
        default,
        rename = "Splitted_data",
        alias = "split_data",
        skip_serializing_if = "Option::is_none"
    )]
    pub split: Option<SplitPreview>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PreprocessMetadata {
    pub timestamp: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    pub data_quality_before: DataQuality,
    pub data_quality_after: DataQuality,
    /// Negative when resampling added rows
    pub rows_removed: i64,
    #[serde(default)]
    pub issues_detected: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DataQuality {
    pub total_rows: u64,
    pub total_columns: u64,
    pub missing_values: u64,
    pub missing_percent: f64,
    pub duplicate_rows: u64,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SplitPreview {
    #[serde(default)]
    pub train_count: u64,
    #[serde(default)]
    pub test_count: u64,
    #[serde(default, rename = "X_train")]
    pub x_train: Vec<PreviewRow>,
    #[serde(default, rename = "X_test")]
    pub x_test: Vec<PreviewRow>,
}

impl SplitPreview {
    /// Feature columns of the processed training data
    pub fn feature_count(&self) -> usize {
        self.x_train.first().map(|row| row.len()).unwrap_or(0)
    }
}

impl PreprocessResponse {
    pub fn rows_removed(&self) -> i64 {
        self.metadata.rows_removed
    }
}

impl Contract for PreprocessResponse {
    fn session_id(&self) -> Option<Uuid> {
        Some(self.session_id)
    }

    fn validate(&self) -> Result<(), String> {
        let before = &self.metadata.data_quality_before;
        if before.total_rows != self.original_shape[0] {
            return Err(format!(
                "original_shape reports {} rows but data_quality_before reports {}",
                self.original_shape[0], before.total_rows
            ));
        }
        Ok(())
    }
}
