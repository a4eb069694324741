//! Backend endpoints consumed by the wizard

use std::fmt;

use crate::steps::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Upload,
    Eda,
    Preprocess,
    Train,
    ReportPreview,
    ReportGenerate,
    FeatureInfo,
    Predict,
    ModelDownload,
    Session,
}

impl Endpoint {
    pub fn method(self) -> Method {
        match self {
            Endpoint::Upload | Endpoint::Eda | Endpoint::Preprocess | Endpoint::Predict => {
                Method::Post
            }
            _ => Method::Get,
        }
    }

    /// Request path. The session endpoint takes the id as a path segment.
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Upload => "/api/dataset/upload",
            Endpoint::Eda => "/api/eda/analyze",
            Endpoint::Preprocess => "/api/preprocess/preprocess",
            Endpoint::Train => "/api/models/models",
            Endpoint::ReportPreview => "/api/report/preview",
            Endpoint::ReportGenerate => "/api/report/generate",
            Endpoint::FeatureInfo => "/api/predict/features",
            Endpoint::Predict => "/api/predict/single",
            Endpoint::ModelDownload => "/api/predict/download-model",
            Endpoint::Session => "/api/session",
        }
    }

    /// Message shown when a failed response carries no usable `detail`
    pub fn fallback_message(self) -> &'static str {
        match self {
            Endpoint::Upload => "Upload failed",
            Endpoint::Eda => "EDA analysis failed",
            Endpoint::Preprocess => "Preprocessing failed",
            Endpoint::Train => "Model training failed",
            Endpoint::ReportPreview | Endpoint::ReportGenerate => "Report generation failed",
            Endpoint::FeatureInfo => "Failed to load feature info",
            Endpoint::Predict => "Prediction failed",
            Endpoint::ModelDownload => "Model download failed",
            Endpoint::Session => "Failed to fetch session",
        }
    }

    /// Wizard stage whose payload this endpoint produces
    pub fn stage(self) -> Option<Stage> {
        match self {
            Endpoint::Upload => Some(Stage::Upload),
            Endpoint::Eda => Some(Stage::ExploratoryAnalysis),
            Endpoint::Preprocess => Some(Stage::Preprocessing),
            Endpoint::Train => Some(Stage::Training),
            Endpoint::ReportPreview => Some(Stage::Report),
            _ => None,
        }
    }

    pub fn requires_session(self) -> bool {
        self != Endpoint::Upload
    }

    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Upload => "upload",
            Endpoint::Eda => "eda",
            Endpoint::Preprocess => "preprocess",
            Endpoint::Train => "train",
            Endpoint::ReportPreview => "report-preview",
            Endpoint::ReportGenerate => "report-generate",
            Endpoint::FeatureInfo => "feature-info",
            Endpoint::Predict => "predict",
            Endpoint::ModelDownload => "model-download",
            Endpoint::Session => "session",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
