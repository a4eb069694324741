use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use automl_wizard::config::Config;
use automl_wizard::env_vars;
use automl_wizard::logging;
use automl_wizard::steps::{Stage, StepStatus};
use automl_wizard::types::{
    self, EdaResponse, PredictionRequest, PreprocessOptions, PreprocessResponse, ReportFormat,
    TrainingResponse, UploadResponse,
};
use automl_wizard::App;

#[derive(Parser)]
#[command(name = "automl-wizard")]
#[command(about = "Step-by-step client for the AutoML pipeline backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show session and step progression
    Status,

    /// Upload a CSV dataset and start a new session
    Upload {
        file: PathBuf,
    },

    /// Run exploratory data analysis
    Eda {
        /// Write the backend's charts as PNG files into this directory
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },

    /// Clean and transform the dataset
    Preprocess {
        /// Missing-value strategy (Mean, Median, Mode, Constant, Drop)
        #[arg(long)]
        missing_strategy: Option<String>,

        #[arg(long)]
        outlier_method: Option<String>,

        #[arg(long)]
        scaling_method: Option<String>,

        #[arg(long)]
        encoding_method: Option<String>,

        #[arg(long)]
        test_size: Option<f64>,

        /// Fill value for the Constant strategy
        #[arg(long)]
        impute_constant: Option<String>,

        /// Extra backend option as KEY=VALUE (repeatable)
        #[arg(long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,
    },

    /// Train and compare models
    Train {
        /// Target column (defaults to the uploaded dataset's target)
        #[arg(short, long)]
        target: Option<String>,

        /// Model to train (repeatable, defaults to the configured list)
        #[arg(short, long = "model")]
        models: Vec<String>,

        /// Tune hyperparameters
        #[arg(long)]
        optimize: bool,

        #[arg(long)]
        test_size: Option<f64>,

        #[arg(long)]
        random_state: Option<u64>,
    },

    /// Describe the features the trained model expects
    Features,

    /// Predict a single row with the best model
    Predict {
        /// Feature values as NAME=VALUE
        #[arg(required = true, value_name = "NAME=VALUE")]
        features: Vec<String>,
    },

    /// Generate the pipeline report
    Report {
        #[arg(short, long, default_value = "markdown")]
        format: ReportFormat,
    },

    /// Download the rendered report file
    Download {
        #[arg(short, long, default_value = "markdown")]
        format: ReportFormat,

        /// Output path (default: report-<session>.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Choose a different target column for the uploaded dataset
    Target {
        column: String,
    },

    /// Revisit a stage and print its cached result
    Show {
        /// Stage name or number (1-5)
        stage: Stage,
    },

    /// Pull the session state from the backend
    Sync,

    /// Forget the current session and all cached results
    Reset,

    /// Print the JSON Schema of a stage's response
    Schema {
        stage: Stage,
    },

    /// List supported environment variables
    Env,

    /// Write the effective configuration to .automl/config.toml
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let logging_handle = logging::init_logging(&config, cli.debug)?;

    let result = run(cli.command, &config).await;

    if let Some(log_path) = logging_handle.log_file_path {
        if log_path.metadata().map(|m| m.len() > 0).unwrap_or(false) {
            eprintln!("Session log: {}", log_path.display());
        }
    }

    result
}

async fn run(command: Commands, config: &Config) -> Result<()> {
    // Commands that never touch the session
    match &command {
        Commands::Schema { stage } => {
            let schema = types::stage_schema(*stage);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            return Ok(());
        }
        Commands::Env => {
            print!("{}", env_vars::format_env_vars());
            return Ok(());
        }
        Commands::InitConfig => {
            config.save()?;
            println!("Wrote {}", Config::project_config_path().display());
            return Ok(());
        }
        _ => {}
    }

    let app = App::from_config(config).context("Failed to initialize")?;

    match command {
        Commands::Status => cmd_status(&app),
        Commands::Upload { file } => cmd_upload(&app, &file).await,
        Commands::Eda { export_dir } => cmd_eda(&app, export_dir.as_deref()).await,
        Commands::Preprocess {
            missing_strategy,
            outlier_method,
            scaling_method,
            encoding_method,
            test_size,
            impute_constant,
            options,
        } => {
            let mut params = config.preprocessing.clone();
            if let Some(v) = missing_strategy {
                params.missing_strategy = v;
            }
            if let Some(v) = outlier_method {
                params.outlier_method = v;
            }
            if let Some(v) = scaling_method {
                params.scaling_method = v;
            }
            if let Some(v) = encoding_method {
                params.encoding_method = v;
            }
            if let Some(v) = test_size {
                params.test_size = v;
            }
            if impute_constant.is_some() {
                params.impute_constant = impute_constant;
            }
            for option in options {
                let (key, value) = option
                    .split_once('=')
                    .with_context(|| format!("expected KEY=VALUE, got '{}'", option))?;
                params.extra.push((key.to_string(), value.to_string()));
            }
            cmd_preprocess(&app, &params).await
        }
        Commands::Train {
            target,
            models,
            optimize,
            test_size,
            random_state,
        } => {
            let mut options = config.training.clone();
            if target.is_some() {
                options.target = target;
            }
            if !models.is_empty() {
                options.models = models;
            }
            options.optimize |= optimize;
            if let Some(v) = test_size {
                options.test_size = v;
            }
            if let Some(v) = random_state {
                options.random_state = v;
            }
            let training = app.train(options).await?;
            print_training(&training);
            print_progress(&app);
            Ok(())
        }
        Commands::Features => {
            let info = app.feature_info().await?;
            println!("Model: {}", info.model_name);
            println!("Features ({}):", info.feature_names.len());
            for name in &info.feature_names {
                match info.feature_types.get(name) {
                    Some(kind) => println!("  {} ({})", name, display_value(kind)),
                    None => println!("  {}", name),
                }
            }
            if !info.class_labels.is_empty() {
                let labels: Vec<String> = info.class_labels.iter().map(display_value).collect();
                println!("Classes: {}", labels.join(", "));
            }
            Ok(())
        }
        Commands::Predict { features } => {
            let request = PredictionRequest::from_pairs(features.iter().map(String::as_str))
                .map_err(anyhow::Error::msg)?;
            if let Ok(info) = app.feature_info().await {
                let missing = request.missing_features(&info);
                if !missing.is_empty() {
                    eprintln!("Warning: no value for {}", missing.join(", "));
                }
            }
            let prediction = app.predict(&request).await?;
            println!("Prediction: {}", prediction.predicted_label);
            if let Some(confidence) = prediction.confidence {
                println!("Confidence: {:.1}%", confidence * 100.0);
            }
            for (label, probability) in prediction.class_probabilities() {
                println!("  {:<20} {:.3}", label, probability);
            }
            println!("Model: {}", prediction.model_name);
            if let Ok(url) = app.model_download_url() {
                println!("Download model: {}", url);
            }
            Ok(())
        }
        Commands::Report { format } => {
            let report = app.generate_report(format).await?;
            println!("{}", report.content);
            eprintln!("Generated {} report at {}", report.format, report.generated_at);
            Ok(())
        }
        Commands::Download { format, output } => {
            let download = app.download_report(format).await?;
            let session = app.session_id().unwrap_or_default();
            let path = output.unwrap_or_else(|| PathBuf::from(download.default_file_name(&session)));
            tokio::fs::write(&path, &download.bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Saved {} ({} bytes)", path.display(), download.bytes.len());
            Ok(())
        }
        Commands::Target { column } => {
            let upload = app.set_target_column(&column)?;
            println!(
                "Target column for {} is now '{}'",
                upload.file_name,
                upload.target_col.unwrap_or_default()
            );
            Ok(())
        }
        Commands::Show { stage } => {
            match app.show(stage)? {
                Some(payload) => println!("{}", serde_json::to_string_pretty(&payload)?),
                None => println!("No cached result for {}", stage),
            }
            print_progress(&app);
            Ok(())
        }
        Commands::Sync => {
            match app.sync_remote().await? {
                Some(_) => {
                    println!("Session synchronized");
                    print_progress(&app);
                }
                None => println!("The backend has no record of this session"),
            }
            Ok(())
        }
        Commands::Reset => {
            app.reset()?;
            println!("Session cleared");
            Ok(())
        }
        Commands::Schema { .. } | Commands::Env | Commands::InitConfig => Ok(()),
    }
}

fn cmd_status(app: &App) -> Result<()> {
    match app.session_id() {
        Some(id) => println!("Session: {}", id),
        None => println!("Session: none (upload a dataset to start)"),
    }
    if let Some(upload) = app.upload_data() {
        println!(
            "Dataset: {} ({} rows, {} columns, target: {})",
            upload.file_name,
            upload.rows,
            upload.columns.len(),
            upload.target_col.as_deref().unwrap_or("-")
        );
    }
    println!();

    let steps = app.steps();
    for stage in Stage::all() {
        let marker = match steps.status(*stage) {
            StepStatus::Active => "▶",
            StepStatus::Completed => "✓",
            StepStatus::Available => "○",
            StepStatus::Locked => "·",
        };
        println!("  {} {}. {}", marker, stage.ordinal(), stage.display_name());
    }
    println!();
    print_progress(app);
    Ok(())
}

async fn cmd_upload(app: &App, file: &Path) -> Result<()> {
    if !file.is_file() {
        bail!("{} does not exist or is not a file", file.display());
    }
    let upload = app.upload_file(file).await?;
    print_upload(&upload);
    print_progress(app);
    Ok(())
}

async fn cmd_eda(app: &App, export_dir: Option<&Path>) -> Result<()> {
    let eda = app.run_eda().await?;
    print_eda(&eda);

    if let (Some(dir), Some(visualizations)) = (export_dir, &eda.eda_report.visualizations) {
        tokio::fs::create_dir_all(dir).await?;
        for (stem, payload) in visualizations.images() {
            let bytes = match types::eda::decode_image(payload) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(image = %stem, error = %e, "Skipping undecodable chart");
                    continue;
                }
            };
            let path = dir.join(format!("{}.png", stem));
            tokio::fs::write(&path, bytes).await?;
            println!("Saved {}", path.display());
        }
    }

    print_progress(app);
    Ok(())
}

async fn cmd_preprocess(app: &App, params: &PreprocessOptions) -> Result<()> {
    let result = app.run_preprocessing(params).await?;
    print_preprocess(&result);
    print_progress(app);
    Ok(())
}

fn print_progress(app: &App) {
    let steps = app.steps();
    println!("{}", steps.format_progress());
    if steps.is_pipeline_complete() {
        println!("Pipeline complete");
    }
}

fn print_upload(upload: &UploadResponse) {
    println!(
        "Uploaded {}: {} rows, {} columns",
        upload.file_name,
        upload.rows,
        upload.columns.len()
    );
    println!("Session: {}", upload.session_id);
    for column in &upload.columns {
        println!("  {:<24} {}", column, upload.dtype(column).unwrap_or("?"));
    }
    if let Some(target) = &upload.target_col {
        println!("Target: {}", target);
    }
    if !upload.class_distribution.is_empty() {
        println!("Class distribution:");
        for (label, count) in &upload.class_distribution {
            println!("  {:<24} {}", label, count);
        }
    }
}

fn print_eda(eda: &EdaResponse) {
    let report = &eda.eda_report;
    println!("Exploratory analysis ({})", eda.status);
    println!("  Numerical columns:   {}", report.numerical_summary.len());
    println!("  Categorical columns: {}", report.categorical_summary.len());

    let missing = report.columns_with_missing();
    if missing.is_empty() {
        println!("  No missing values");
    } else {
        println!("  Missing values:");
        for (column, count) in missing {
            println!("    {:<22} {}", column, count);
        }
    }
}

fn print_preprocess(result: &PreprocessResponse) {
    println!(
        "Preprocessed: {} x {} -> {} x {}",
        result.original_shape[0],
        result.original_shape[1],
        result.cleaned_shape[0],
        result.cleaned_shape[1]
    );
    let before = &result.metadata.data_quality_before;
    let after = &result.metadata.data_quality_after;
    println!(
        "  Missing values: {} -> {}",
        before.missing_values, after.missing_values
    );
    println!(
        "  Duplicate rows: {} -> {}",
        before.duplicate_rows, after.duplicate_rows
    );
    println!("  Rows removed:   {}", result.rows_removed());
    for issue in &result.metadata.issues_detected {
        println!("  Issue: {}", display_value(issue));
    }
    if let Some(split) = &result.split {
        println!(
            "  Split: {} train / {} test, {} features",
            split.train_count,
            split.test_count,
            split.feature_count()
        );
    }
}

fn print_training(training: &TrainingResponse) {
    println!("{:<32} {:>10} {:>10}", "Model", "Accuracy", "F1");
    println!("{}", "─".repeat(54));
    for (name, metrics) in training.all_results() {
        let accuracy = metrics
            .accuracy()
            .map(|v| format!("{:.4}", v))
            .unwrap_or_else(|| "-".to_string());
        let f1 = metrics
            .f1()
            .map(|v| format!("{:.4}", v))
            .unwrap_or_else(|| "-".to_string());
        println!("{:<32} {:>10} {:>10}", name, accuracy, f1);
    }

    if let Some(best) = training.best_model() {
        println!();
        println!("Best model: {} ({:?} {:.4})", best.name, best.metric, best.score);
    }
    if let Some(reported) = &training.model_results.best_model {
        if !reported.reason.is_empty() {
            println!("Backend: {} - {}", reported.name, reported.reason);
        }
    }
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
