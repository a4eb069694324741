//! Pipeline coordinator.
//!
//! Drives one stage at a time the way a step view does: enter the stage,
//! call the gateway, and only on success cache the payload and signal the
//! controller. A failed call leaves the store and progression untouched.

use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use thiserror::Error;

use crate::api::{ApiError, Endpoint, Gateway, HttpTransport, StageResult, Transport};
use crate::config::Config;
use crate::steps::{InFlight, Stage, StepData, StepError, StepManager, StepProgress};
use crate::store::{FileStorage, SessionStore, StoreError};
use crate::types::{
    self, Contract, EdaResponse, FeatureInfo, PredictionRequest, PredictionResponse,
    PreprocessOptions, PreprocessResponse, ReportDownload, ReportFormat, ReportResponse,
    TrainOptions, TrainingResponse, UploadResponse,
};

#[derive(Error, Debug)]
pub enum WizardError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct App {
    store: SessionStore,
    gateway: Gateway,
    steps: Mutex<StepManager>,
    in_flight: InFlight<Endpoint>,
}

impl App {
    /// Build over an existing store, restoring progression from what it holds
    pub fn new(store: SessionStore, transport: Arc<dyn Transport>) -> Self {
        let steps = StepManager::restore(&StepData::from_store(&store));
        Self {
            gateway: Gateway::new(transport, store.clone()),
            store,
            steps: Mutex::new(steps),
            in_flight: InFlight::new(),
        }
    }

    /// File-backed store under `paths.state` and an HTTP transport to `backend.base_url`
    pub fn from_config(config: &Config) -> Result<Self, WizardError> {
        let storage = FileStorage::new(config.state_path());
        let transport = HttpTransport::new(
            &config.backend.base_url,
            config.backend.timeout_secs,
            &config.backend.user_agent,
        )
        .map_err(|e| WizardError::InvalidInput(format!("cannot create HTTP client: {}", e)))?;

        Ok(Self::new(
            SessionStore::new(Arc::new(storage)),
            Arc::new(transport),
        ))
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn session_id(&self) -> Option<String> {
        self.store.session_id()
    }

    /// Copy of the current progression
    pub fn steps(&self) -> StepManager {
        self.lock_steps().clone()
    }

    pub fn progress(&self) -> StepProgress {
        self.lock_steps().progress()
    }

    /// Cached payload for a stage, decoded into its contract type.
    /// A payload that no longer decodes is treated as absent.
    pub fn cached<T: Contract>(&self, stage: Stage) -> Option<T> {
        let payload = self.store.stage_payload(stage)?;
        match types::decode(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(stage = %stage, error = %e, "Ignoring cached payload that no longer decodes");
                None
            }
        }
    }

    pub fn upload_data(&self) -> Option<UploadResponse> {
        self.cached(Stage::Upload)
    }

    /// Revisit a stage and return its cached payload. Locked stages are refused.
    pub fn show(&self, stage: Stage) -> Result<Option<Value>, WizardError> {
        self.lock_steps().jump_to(stage)?;
        Ok(self.store.stage_payload(stage))
    }

    pub async fn upload_file(&self, path: &Path) -> Result<UploadResponse, WizardError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| {
                WizardError::InvalidInput(format!("{} is not a file", path.display()))
            })?;

        self.upload(&file_name, bytes).await
    }

    /// Upload a dataset. A response carrying a new session id starts a fresh
    /// pipeline run: the old cache is dropped and progression resets.
    /// Progression only moves once the session id and payload are persisted.
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadResponse, WizardError> {
        let endpoint = Endpoint::Upload;
        let _guard = self
            .in_flight
            .try_begin(endpoint)
            .ok_or(ApiError::Busy(endpoint))?;

        let result = self.gateway.upload(file_name, bytes, None).await?;
        let session_id = result.data.session_id.to_string();

        let new_session = self.store.session_id().as_deref() != Some(session_id.as_str());
        if new_session {
            tracing::info!(session_id = %session_id, "Starting new session");
            if let Err(e) = self.store.clear() {
                tracing::warn!(error = %e, "Failed to clear previous session");
            }
        }

        if let Err(e) = self.store.set_session_id(&session_id) {
            tracing::warn!(error = %e, "Failed to persist session id");
            if new_session {
                self.resync_steps();
            }
            return Err(e.into());
        }
        if new_session {
            self.lock_steps().reset();
        }
        self.finish_stage(Stage::Upload, &result.raw)?;

        Ok(result.data)
    }

    pub async fn run_eda(&self) -> Result<EdaResponse, WizardError> {
        self.run_stage(Endpoint::Eda, || self.gateway.run_eda()).await
    }

    pub async fn run_preprocessing(
        &self,
        options: &PreprocessOptions,
    ) -> Result<PreprocessResponse, WizardError> {
        options.validate().map_err(WizardError::InvalidInput)?;
        self.run_stage(Endpoint::Preprocess, || {
            self.gateway.run_preprocessing(options)
        })
        .await
    }

    /// Train models. Without an explicit target, the uploaded dataset's
    /// target column is used; with neither, the backend picks.
    pub async fn train(&self, mut options: TrainOptions) -> Result<TrainingResponse, WizardError> {
        options.validate().map_err(WizardError::InvalidInput)?;
        if options.target.is_none() {
            options.target = self.upload_data().and_then(|upload| upload.target_col);
        }

        self.run_stage(Endpoint::Train, || self.gateway.train_models(&options))
            .await
    }

    pub async fn generate_report(&self, format: ReportFormat) -> Result<ReportResponse, WizardError> {
        self.run_stage(Endpoint::ReportPreview, || {
            self.gateway.report_preview(format)
        })
        .await
    }

    /// Fetch the rendered report file. Needs the Report stage unlocked but
    /// does not change progression.
    pub async fn download_report(&self, format: ReportFormat) -> Result<ReportDownload, WizardError> {
        self.ensure_unlocked(Stage::Report)?;
        let endpoint = Endpoint::ReportGenerate;
        let _guard = self
            .in_flight
            .try_begin(endpoint)
            .ok_or(ApiError::Busy(endpoint))?;

        Ok(self.gateway.report_download(format).await?)
    }

    pub async fn feature_info(&self) -> Result<FeatureInfo, WizardError> {
        self.ensure_unlocked(Stage::Report)?;
        Ok(self.gateway.feature_info().await?)
    }

    pub async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse, WizardError> {
        self.ensure_unlocked(Stage::Report)?;
        if request.features.is_empty() {
            return Err(WizardError::InvalidInput(
                "provide at least one feature value".to_string(),
            ));
        }

        let endpoint = Endpoint::Predict;
        let _guard = self
            .in_flight
            .try_begin(endpoint)
            .ok_or(ApiError::Busy(endpoint))?;

        Ok(self.gateway.predict(request).await?)
    }

    pub fn model_download_url(&self) -> Result<String, WizardError> {
        self.ensure_unlocked(Stage::Report)?;
        Ok(self.gateway.model_download_url()?)
    }

    /// Choose a different target column for the uploaded dataset.
    /// The cached Upload payload is rewritten with the new `targetCol`.
    pub fn set_target_column(&self, column: &str) -> Result<UploadResponse, WizardError> {
        if self.store.session_id().is_none() {
            return Err(ApiError::missing_session(Endpoint::Upload).into());
        }
        let mut payload = self.store.stage_payload(Stage::Upload).ok_or_else(|| {
            WizardError::InvalidInput("no uploaded dataset to choose a target from".to_string())
        })?;
        let mut upload: UploadResponse = types::decode(payload.clone())
            .map_err(|e| WizardError::InvalidInput(format!("cached upload is unreadable: {}", e)))?;

        if !upload.has_column(column) {
            return Err(WizardError::InvalidInput(format!(
                "'{}' is not a column of {} (columns: {})",
                column,
                upload.file_name,
                upload.columns.join(", ")
            )));
        }

        if let Some(object) = payload.as_object_mut() {
            object.insert("targetCol".to_string(), Value::String(column.to_string()));
        }
        self.store.set_stage_payload(Stage::Upload, &payload)?;
        upload.target_col = Some(column.to_string());

        tracing::info!(target_column = %column, "Target column changed");
        Ok(upload)
    }

    /// Pull the backend's view of the session into the local cache, then
    /// recompute progression from what is cached. The snapshot's own
    /// `currentStep` is never trusted. Returns `None` when the backend does
    /// not know the session.
    pub async fn sync_remote(&self) -> Result<Option<StepProgress>, WizardError> {
        let Some(snapshot) = self.gateway.fetch_session().await? else {
            return Ok(None);
        };

        for (stage, payload) in snapshot.data.payloads() {
            if let Err(e) = self.store.set_stage_payload(stage, &payload) {
                tracing::warn!(stage = %stage, error = %e, "Failed to cache synced payload");
            }
        }

        if let Some(hint) = snapshot.data.current_step {
            tracing::debug!(remote_current_step = hint, "Ignoring remote current step");
        }

        Ok(Some(self.resync_steps()))
    }

    /// Forget the session and every cached payload
    pub fn reset(&self) -> Result<(), WizardError> {
        self.store.clear()?;
        self.lock_steps().reset();
        tracing::info!("Session reset");
        Ok(())
    }

    /// Run a session-scoped stage: refuse locked or busy stages, call the
    /// backend, then cache and signal only on success.
    async fn run_stage<T, F, Fut>(&self, endpoint: Endpoint, call: F) -> Result<T, WizardError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<StageResult<T>, ApiError>>,
    {
        let stage = endpoint.stage().ok_or_else(|| {
            WizardError::InvalidInput(format!("{} is not a wizard stage", endpoint))
        })?;

        let _guard = self
            .in_flight
            .try_begin(endpoint)
            .ok_or(ApiError::Busy(endpoint))?;
        self.ensure_unlocked(stage)?;

        let result = call().await?;
        self.finish_stage(stage, &result.raw)?;
        Ok(result.data)
    }

    /// Cache the payload, then enter the stage, unlock the next one and move
    /// to it. Progression is untouched when the payload cannot be cached.
    fn finish_stage(&self, stage: Stage, payload: &Value) -> Result<(), WizardError> {
        if let Err(e) = self.store.set_stage_payload(stage, payload) {
            tracing::warn!(stage = %stage, error = %e, "Failed to cache stage payload");
            return Err(e.into());
        }

        let mut steps = self.lock_steps();
        steps.jump_to(stage)?;
        steps.on_stage_success(stage);
        if !stage.is_final() {
            if let Err(e) = steps.advance() {
                tracing::debug!(error = %e, "Not advancing");
            }
        }
        Ok(())
    }

    /// Recompute progression from what the store actually holds
    fn resync_steps(&self) -> StepProgress {
        let restored = StepManager::restore(&StepData::from_store(&self.store));
        let progress = restored.progress();
        *self.lock_steps() = restored;
        progress
    }

    fn ensure_unlocked(&self, stage: Stage) -> Result<(), WizardError> {
        let steps = self.lock_steps();
        if steps.is_locked(stage) {
            return Err(StepError::Locked {
                target: stage,
                completed: steps.completed(),
            }
            .into());
        }
        Ok(())
    }

    fn lock_steps(&self) -> MutexGuard<'_, StepManager> {
        self.steps.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
