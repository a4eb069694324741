//! Remote session snapshot: `GET /api/session/{id}`

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{decode, Contract, EdaResponse, PreprocessResponse, TrainingResponse, UploadResponse};
use crate::steps::Stage;

/// Server-side view of a session. Stage payloads are kept as raw JSON so
/// they can be cached verbatim; each one is still checked against its stage
/// contract before the snapshot is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(rename = "session_id")]
    pub session_id: Uuid,
    /// Last step the server saw. Informational only.
    #[serde(default)]
    pub current_step: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eda_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocessing_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_data: Option<Value>,
}

impl SessionSnapshot {
    /// Present stage payloads in pipeline order
    pub fn payloads(&self) -> Vec<(Stage, Value)> {
        [
            (Stage::Upload, &self.upload_data),
            (Stage::ExploratoryAnalysis, &self.eda_data),
            (Stage::Preprocessing, &self.preprocessing_data),
            (Stage::Training, &self.training_data),
        ]
        .into_iter()
        .filter_map(|(stage, payload)| payload.clone().map(|p| (stage, p)))
        .collect()
    }
}

fn check_payload(stage: Stage, payload: &Value) -> Result<Option<Uuid>, String> {
    let value = payload.clone();
    let session = match stage {
        Stage::Upload => decode::<UploadResponse>(value)?.session_id(),
        Stage::ExploratoryAnalysis => decode::<EdaResponse>(value)?.session_id(),
        Stage::Preprocessing => decode::<PreprocessResponse>(value)?.session_id(),
        Stage::Training => decode::<TrainingResponse>(value)?.session_id(),
        Stage::Report => None,
    };
    Ok(session)
}

impl Contract for SessionSnapshot {
    fn session_id(&self) -> Option<Uuid> {
        Some(self.session_id)
    }

    fn validate(&self) -> Result<(), String> {
        for (stage, payload) in self.payloads() {
            let owner = check_payload(stage, &payload)
                .map_err(|e| format!("{} payload: {}", stage.name(), e))?;
            if let Some(owner) = owner {
                if owner != self.session_id {
                    return Err(format!(
                        "{} payload belongs to session {}, not {}",
                        stage.name(),
                        owner,
                        self.session_id
                    ));
                }
            }
        }
        Ok(())
    }
}
