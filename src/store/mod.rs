//! Session Store: durable session identity and per-stage payload cache
//!
//! The store owns no business logic. Reads are total: an unavailable backend
//! or a value that no longer decodes is reported as absent, never as an error.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::steps::Stage;

/// Fixed key holding the server-issued session identifier
pub const SESSION_ID_KEY: &str = "automl_session_id";

/// Errors raised by storage backends
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode value for '{0}': {1}")]
    Encode(String, String),
}

/// Raw key-value persistence scoped to one client
pub trait Storage: Send + Sync {
    /// Read the text stored under `key`, `None` if nothing is stored
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite the text stored under `key`
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`; removing a missing key succeeds
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Typed session store over a shared [`Storage`] handle
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Persisted session identifier, if any
    pub fn session_id(&self) -> Option<String> {
        match self.read_value(SESSION_ID_KEY)? {
            Value::String(id) if !id.trim().is_empty() => Some(id),
            other => {
                tracing::warn!(key = SESSION_ID_KEY, value = %other, "Ignoring malformed session id");
                None
            }
        }
    }

    /// Overwrite the persisted session identifier
    pub fn set_session_id(&self, id: &str) -> Result<(), StoreError> {
        self.write_value(SESSION_ID_KEY, &Value::String(id.to_string()))
    }

    /// Last cached payload for a stage
    pub fn stage_payload(&self, stage: Stage) -> Option<Value> {
        self.read_value(stage.storage_key())
    }

    /// Overwrite the cached payload for a stage
    pub fn set_stage_payload(&self, stage: Stage, payload: &Value) -> Result<(), StoreError> {
        self.write_value(stage.storage_key(), payload)
    }

    /// Stages that currently have a readable cached payload, in pipeline order
    pub fn cached_stages(&self) -> Vec<Stage> {
        Stage::all()
            .iter()
            .copied()
            .filter(|stage| self.stage_payload(*stage).is_some())
            .collect()
    }

    /// Remove the session identifier and every cached payload
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut first_error = None;
        let keys = std::iter::once(SESSION_ID_KEY).chain(Stage::all().iter().map(|s| s.storage_key()));

        for key in keys {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!(key, error = %e, "Failed to remove stored value");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn read_value(&self, key: &str) -> Option<Value> {
        let text = match self.storage.read(key) {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Storage read failed, treating as absent");
                return None;
            }
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Null) => None,
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Stored value does not decode, treating as absent");
                None
            }
        }
    }

    fn write_value(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let text = serde_json::to_string(value)
            .map_err(|e| StoreError::Encode(key.to_string(), e.to_string()))?;
        self.storage.write(key, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_store() -> (Arc<MemoryStorage>, SessionStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        (storage, store)
    }

    #[test]
    fn test_session_id_round_trip() {
        let (_, store) = memory_store();
        assert_eq!(store.session_id(), None);

        store
            .set_session_id("11111111-1111-1111-1111-111111111111")
            .unwrap();
        assert_eq!(
            store.session_id().as_deref(),
            Some("11111111-1111-1111-1111-111111111111")
        );

        store.set_session_id("22222222-2222-2222-2222-222222222222").unwrap();
        assert_eq!(
            store.session_id().as_deref(),
            Some("22222222-2222-2222-2222-222222222222")
        );
    }

    #[test]
    fn test_stage_payload_reads_back_deep_equal() {
        let (_, store) = memory_store();
        let payload = json!({
            "status": "success",
            "eda_report": {"missing_values": {"age": 3}, "numerical_summary": {}},
            "list": [1, 2.5, null, "x"]
        });

        store
            .set_stage_payload(Stage::ExploratoryAnalysis, &payload)
            .unwrap();
        assert_eq!(store.stage_payload(Stage::ExploratoryAnalysis), Some(payload));
        assert_eq!(store.stage_payload(Stage::Training), None);
    }

    #[test]
    fn test_corrupt_text_is_absent() {
        let (storage, store) = memory_store();
        storage.insert_raw(Stage::Upload.storage_key(), "{not json");
        storage.insert_raw(SESSION_ID_KEY, "42");

        assert_eq!(store.stage_payload(Stage::Upload), None);
        assert_eq!(store.session_id(), None);
        assert!(store.cached_stages().is_empty());
    }

    #[test]
    fn test_unavailable_storage_degrades_to_no_session() {
        let store = SessionStore::new(Arc::new(MemoryStorage::unavailable()));

        assert_eq!(store.session_id(), None);
        assert_eq!(store.stage_payload(Stage::Upload), None);
        assert!(matches!(
            store.set_session_id("abc"),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn test_clear_removes_everything() {
        let (_, store) = memory_store();
        store.set_session_id("abc").unwrap();
        store.set_stage_payload(Stage::Upload, &json!({"rows": 1})).unwrap();
        store.set_stage_payload(Stage::Report, &json!({"content": "# hi"})).unwrap();

        assert_eq!(store.cached_stages(), vec![Stage::Upload, Stage::Report]);

        store.clear().unwrap();
        assert_eq!(store.session_id(), None);
        assert!(store.cached_stages().is_empty());
    }
}
