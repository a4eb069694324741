//! Step Data Cache: derives progression from what is actually cached

use crate::store::SessionStore;

use super::Stage;

/// Snapshot of the stored session used to reconcile progression on load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepData {
    pub session_id: Option<String>,
    /// Stages with a readable cached payload, in pipeline order
    pub cached: Vec<Stage>,
}

impl StepData {
    pub fn from_store(store: &SessionStore) -> Self {
        Self {
            session_id: store.session_id(),
            cached: store.cached_stages(),
        }
    }

    pub fn highest_cached(&self) -> Option<Stage> {
        self.cached.iter().copied().max()
    }

    /// Highest unlocked stage: the one after the highest cached payload.
    ///
    /// Without a session id nothing beyond Upload is reachable, whatever
    /// payloads happen to be lying around.
    pub fn completed_step(&self) -> Stage {
        if self.session_id.is_none() {
            return Stage::Upload;
        }

        match self.highest_cached() {
            Some(stage) => stage.next().unwrap_or(Stage::Report),
            None => Stage::Upload,
        }
    }

    /// Stage to show after a reload
    pub fn current_step(&self) -> Stage {
        self.completed_step()
    }
}
