//! Upload stage: `POST /api/dataset/upload`

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Contract, PreviewRow};

/// Dataset summary returned by a successful upload. Issues the session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "session_id")]
    pub session_id: Uuid,
    pub file_name: String,
    pub columns: Vec<String>,
    pub rows: u64,
    /// Column name to inferred dtype name
    pub dtypes: BTreeMap<String, String>,
    #[serde(default)]
    pub target_col: Option<String>,
    /// Class label to count
    #[serde(default)]
    pub class_distribution: BTreeMap<String, f64>,
    #[serde(default)]
    pub preview: Vec<PreviewRow>,
}

impl UploadResponse {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn dtype(&self, column: &str) -> Option<&str> {
        self.dtypes.get(column).map(String::as_str)
    }
}

impl Contract for UploadResponse {
    fn session_id(&self) -> Option<Uuid> {
        Some(self.session_id)
    }

    fn validate(&self) -> Result<(), String> {
        match &self.target_col {
            Some(target) if !self.has_column(target) => Err(format!(
                "targetCol '{}' is not one of the uploaded columns",
                target
            )),
            _ => Ok(()),
        }
    }
}
