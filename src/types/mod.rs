//! Request/response contracts for each backend stage.
//!
//! Every success body is decoded into one of these types at the gateway
//! boundary. A body that does not decode, or that decodes but breaks one of
//! the cross-field rules in [`Contract::validate`], is a contract error.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::steps::Stage;

pub mod eda;
pub mod prediction;
pub mod preprocess;
pub mod report;
pub mod session;
pub mod training;
pub mod upload;

pub use eda::{EdaReport, EdaResponse, OutlierReport, Visualizations};
pub use prediction::{FeatureInfo, PredictionRequest, PredictionResponse};
pub use preprocess::{DataQuality, PreprocessMetadata, PreprocessOptions, PreprocessResponse, SplitPreview};
pub use report::{ReportDownload, ReportFormat, ReportResponse};
pub use session::SessionSnapshot;
pub use training::{
    select_best_model, BestModel, ModelChoice, ModelMetrics, ModelResult, ModelResults,
    ScoreMetric, TrainOptions, TrainingResponse, AVAILABLE_MODELS,
};
pub use upload::UploadResponse;

/// Row of a data preview: column name to cell value, in column order
pub type PreviewRow = indexmap::IndexMap<String, Value>;

/// A decoded, validated backend response body
pub trait Contract: DeserializeOwned + Serialize + JsonSchema {
    /// Session the response claims to belong to
    fn session_id(&self) -> Option<Uuid> {
        None
    }

    /// Cross-field rules serde cannot express
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Decode a JSON value into a contract type and run its validation
pub fn decode<T: Contract>(value: Value) -> Result<T, String> {
    let decoded: T = serde_json::from_value(value).map_err(|e| e.to_string())?;
    decoded.validate()?;
    Ok(decoded)
}

/// JSON Schema of the success body for a stage
pub fn stage_schema(stage: Stage) -> Value {
    let schema = match stage {
        Stage::Upload => schemars::schema_for!(UploadResponse),
        Stage::ExploratoryAnalysis => schemars::schema_for!(EdaResponse),
        Stage::Preprocessing => schemars::schema_for!(PreprocessResponse),
        Stage::Training => schemars::schema_for!(TrainingResponse),
        Stage::Report => schemars::schema_for!(ReportResponse),
    };
    schema.to_value()
}
