//! The five fixed pipeline stages

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the five fixed wizard stages, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Upload,
    ExploratoryAnalysis,
    Preprocessing,
    Training,
    Report,
}

impl Stage {
    /// Number of stages in the pipeline
    pub const COUNT: u8 = 5;

    /// All stages in pipeline order
    pub fn all() -> &'static [Stage] {
        &[
            Stage::Upload,
            Stage::ExploratoryAnalysis,
            Stage::Preprocessing,
            Stage::Training,
            Stage::Report,
        ]
    }

    /// 1-based position in the pipeline
    pub fn ordinal(self) -> u8 {
        match self {
            Stage::Upload => 1,
            Stage::ExploratoryAnalysis => 2,
            Stage::Preprocessing => 3,
            Stage::Training => 4,
            Stage::Report => 5,
        }
    }

    /// Stage for a 1-based ordinal, `None` outside 1..=5
    pub fn from_ordinal(ordinal: u8) -> Option<Stage> {
        match ordinal {
            1 => Some(Stage::Upload),
            2 => Some(Stage::ExploratoryAnalysis),
            3 => Some(Stage::Preprocessing),
            4 => Some(Stage::Training),
            5 => Some(Stage::Report),
            _ => None,
        }
    }

    /// Stage whose success unlocks this one
    pub fn predecessor(self) -> Option<Stage> {
        Stage::from_ordinal(self.ordinal() - 1)
    }

    pub fn next(self) -> Option<Stage> {
        Stage::from_ordinal(self.ordinal() + 1)
    }

    pub fn is_first(self) -> bool {
        self == Stage::Upload
    }

    pub fn is_final(self) -> bool {
        self == Stage::Report
    }

    /// Short name used in progress strings and CLI arguments
    pub fn name(self) -> &'static str {
        match self {
            Stage::Upload => "upload",
            Stage::ExploratoryAnalysis => "eda",
            Stage::Preprocessing => "preprocessing",
            Stage::Training => "training",
            Stage::Report => "report",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Stage::Upload => "Upload",
            Stage::ExploratoryAnalysis => "EDA",
            Stage::Preprocessing => "Preprocessing",
            Stage::Training => "Training",
            Stage::Report => "Report",
        }
    }

    /// Fixed storage key under which the stage's last payload is cached
    pub fn storage_key(self) -> &'static str {
        match self {
            Stage::Upload => "automl_upload_data",
            Stage::ExploratoryAnalysis => "automl_eda_data",
            Stage::Preprocessing => "automl_preprocessing_data",
            Stage::Training => "automl_training_data",
            Stage::Report => "automl_report_data",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(ordinal) = s.parse::<u8>() {
            return Stage::from_ordinal(ordinal)
                .ok_or_else(|| format!("stage ordinal must be 1-{}, got {}", Stage::COUNT, s));
        }

        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "upload" => Ok(Stage::Upload),
            "eda" | "exploratoryanalysis" | "analysis" => Ok(Stage::ExploratoryAnalysis),
            "preprocessing" | "preprocess" => Ok(Stage::Preprocessing),
            "training" | "train" => Ok(Stage::Training),
            "report" => Ok(Stage::Report),
            _ => Err(format!("unknown stage '{}'", s)),
        }
    }
}
