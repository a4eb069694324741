//! Environment variable registry.
//!
//! Every config key can be overridden with the `AUTOML` prefix and `__` as
//! the section separator (e.g. `AUTOML__BACKEND__BASE_URL`). This list is
//! what `automl-wizard env` prints.

/// An environment variable definition
#[derive(Debug, Clone)]
pub struct EnvVar {
    pub name: &'static str,
    pub description: &'static str,
    pub category: EnvVarCategory,
    pub default: Option<&'static str>,
    pub example: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvVarCategory {
    Backend,
    Paths,
    Logging,
    Preprocessing,
    Training,
    Testing,
}

impl EnvVarCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            EnvVarCategory::Backend => "Backend",
            EnvVarCategory::Paths => "Paths",
            EnvVarCategory::Logging => "Logging",
            EnvVarCategory::Preprocessing => "Preprocessing",
            EnvVarCategory::Training => "Training",
            EnvVarCategory::Testing => "Testing",
        }
    }

    /// All categories in display order
    pub fn all() -> &'static [EnvVarCategory] {
        &[
            EnvVarCategory::Backend,
            EnvVarCategory::Paths,
            EnvVarCategory::Logging,
            EnvVarCategory::Preprocessing,
            EnvVarCategory::Training,
            EnvVarCategory::Testing,
        ]
    }
}

pub static ENV_VARS: &[EnvVar] = &[
    // === Backend ===
    EnvVar {
        name: "AUTOML__BACKEND__BASE_URL",
        description: "Base URL of the AutoML backend",
        category: EnvVarCategory::Backend,
        default: Some("http://localhost:8000"),
        example: Some("https://automl.example.com"),
    },
    EnvVar {
        name: "AUTOML__BACKEND__TIMEOUT_SECS",
        description: "Seconds before a backend request is abandoned",
        category: EnvVarCategory::Backend,
        default: Some("300"),
        example: Some("60"),
    },
    EnvVar {
        name: "AUTOML__BACKEND__USER_AGENT",
        description: "User-Agent header sent with every request",
        category: EnvVarCategory::Backend,
        default: Some("automl-wizard/<version>"),
        example: None,
    },
    // === Paths ===
    EnvVar {
        name: "AUTOML__PATHS__STATE",
        description: "Directory holding the session store and logs",
        category: EnvVarCategory::Paths,
        default: Some(".automl"),
        example: Some("/var/lib/automl"),
    },
    // === Logging ===
    EnvVar {
        name: "AUTOML__LOGGING__LEVEL",
        description: "Log level (trace, debug, info, warn, error)",
        category: EnvVarCategory::Logging,
        default: Some("info"),
        example: Some("debug"),
    },
    EnvVar {
        name: "AUTOML__LOGGING__TO_FILE",
        description: "Write logs to <state>/logs instead of stderr",
        category: EnvVarCategory::Logging,
        default: Some("false"),
        example: Some("true"),
    },
    EnvVar {
        name: "RUST_LOG",
        description: "Filter directive overriding the configured log level",
        category: EnvVarCategory::Logging,
        default: None,
        example: Some("automl_wizard=debug"),
    },
    // === Preprocessing ===
    EnvVar {
        name: "AUTOML__PREPROCESSING__MISSING_STRATEGY",
        description: "Missing-value strategy (Mean, Median, Mode, Constant, Drop)",
        category: EnvVarCategory::Preprocessing,
        default: Some("Mean"),
        example: Some("Median"),
    },
    EnvVar {
        name: "AUTOML__PREPROCESSING__OUTLIER_METHOD",
        description: "Outlier handling method",
        category: EnvVarCategory::Preprocessing,
        default: Some("Remove"),
        example: Some("Cap"),
    },
    EnvVar {
        name: "AUTOML__PREPROCESSING__SCALING_METHOD",
        description: "Feature scaling method",
        category: EnvVarCategory::Preprocessing,
        default: Some("Standard"),
        example: Some("MinMax"),
    },
    EnvVar {
        name: "AUTOML__PREPROCESSING__ENCODING_METHOD",
        description: "Categorical encoding method",
        category: EnvVarCategory::Preprocessing,
        default: Some("OneHot"),
        example: Some("Label"),
    },
    EnvVar {
        name: "AUTOML__PREPROCESSING__TEST_SIZE",
        description: "Fraction of rows held out for testing",
        category: EnvVarCategory::Preprocessing,
        default: Some("0.2"),
        example: Some("0.3"),
    },
    // === Training ===
    EnvVar {
        name: "AUTOML__TRAINING__OPTIMIZE",
        description: "Run hyperparameter tuning after the base fit",
        category: EnvVarCategory::Training,
        default: Some("false"),
        example: Some("true"),
    },
    EnvVar {
        name: "AUTOML__TRAINING__TEST_SIZE",
        description: "Fraction of rows held out for model evaluation",
        category: EnvVarCategory::Training,
        default: Some("0.2"),
        example: Some("0.25"),
    },
    EnvVar {
        name: "AUTOML__TRAINING__RANDOM_STATE",
        description: "Seed for the train/test split and model fitting",
        category: EnvVarCategory::Training,
        default: Some("42"),
        example: Some("7"),
    },
    // === Testing ===
    EnvVar {
        name: "AUTOML_BACKEND_TEST_URL",
        description: "Backend URL for live integration tests; unset skips them",
        category: EnvVarCategory::Testing,
        default: None,
        example: Some("http://localhost:8000"),
    },
];

pub fn env_vars_for_category(category: EnvVarCategory) -> impl Iterator<Item = &'static EnvVar> {
    ENV_VARS.iter().filter(move |v| v.category == category)
}

/// Environment variables grouped by category, empty categories omitted
pub fn env_vars_by_category() -> Vec<(EnvVarCategory, Vec<&'static EnvVar>)> {
    EnvVarCategory::all()
        .iter()
        .map(|cat| {
            let vars: Vec<&EnvVar> = env_vars_for_category(*cat).collect();
            (*cat, vars)
        })
        .filter(|(_, vars)| !vars.is_empty())
        .collect()
}

/// Plain-text listing grouped by category
pub fn format_env_vars() -> String {
    let mut out = String::new();
    for (category, vars) in env_vars_by_category() {
        out.push_str(&format!("{}:\n", category.display_name()));
        for var in vars {
            out.push_str(&format!("  {}\n      {}\n", var.name, var.description));
            if let Some(default) = var.default {
                out.push_str(&format!("      default: {}\n", default));
            }
            if let Some(example) = var.example {
                out.push_str(&format!("      example: {}\n", example));
            }
        }
        out.push('\n');
    }
    out
}
