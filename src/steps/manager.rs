//! Step Progression Controller for the five-stage wizard

use serde::Serialize;
use thiserror::Error;

use super::{Stage, StepData};

/// Rejected transitions. State is never mutated when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("{target} is locked: complete the stages up to {completed} first")]
    Locked { target: Stage, completed: Stage },

    #[error("already at the final stage")]
    FinalStage,
}

/// How a stage should be presented relative to the current progression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Active,
    Completed,
    Available,
    Locked,
}

/// Serializable view of progression for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepProgress {
    pub current_step: u8,
    pub completed_step: u8,
    pub total_steps: u8,
    pub pipeline_complete: bool,
}

/// State machine over the fixed stages.
///
/// `completed` is the highest unlocked stage. It only moves forward, and only
/// through [`StepManager::on_stage_success`]. `current` never exceeds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepManager {
    current: Stage,
    completed: Stage,
}

impl Default for StepManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StepManager {
    /// Fresh progression: on Upload with nothing unlocked beyond it
    pub fn new() -> Self {
        Self {
            current: Stage::Upload,
            completed: Stage::Upload,
        }
    }

    /// Rebuild progression from cached payload presence. Any stored
    /// "current step" is ignored; both values come from the cache.
    pub fn restore(data: &StepData) -> Self {
        let completed = data.completed_step();
        tracing::debug!(
            completed = completed.ordinal(),
            cached = data.cached.len(),
            "Restored step progression"
        );
        Self {
            current: data.current_step().min(completed),
            completed,
        }
    }

    pub fn current(&self) -> Stage {
        self.current
    }

    pub fn completed(&self) -> Stage {
        self.completed
    }

    pub fn is_locked(&self, stage: Stage) -> bool {
        stage > self.completed
    }

    pub fn is_active(&self, stage: Stage) -> bool {
        stage == self.current
    }

    /// Strictly below the completed step; the active stage is never reported
    /// as completed.
    pub fn is_completed(&self, stage: Stage) -> bool {
        stage < self.completed && !self.is_active(stage)
    }

    pub fn status(&self, stage: Stage) -> StepStatus {
        if self.is_active(stage) {
            StepStatus::Active
        } else if self.is_locked(stage) {
            StepStatus::Locked
        } else if self.is_completed(stage) {
            StepStatus::Completed
        } else {
            StepStatus::Available
        }
    }

    /// Move to the next stage. The next stage must already be unlocked.
    pub fn advance(&mut self) -> Result<Stage, StepError> {
        let next = self.current.next().ok_or(StepError::FinalStage)?;
        if self.is_locked(next) {
            return Err(StepError::Locked {
                target: next,
                completed: self.completed,
            });
        }

        self.current = next;
        tracing::debug!(current = next.ordinal(), "Advanced step");
        Ok(next)
    }

    /// Record a successful backend call for `stage`, unlocking the stage after
    /// it. Repeating the signal, or signalling an older stage, changes nothing.
    /// Returns whether a new stage was unlocked.
    pub fn on_stage_success(&mut self, stage: Stage) -> bool {
        if stage < self.completed {
            return false;
        }

        let unlocked = stage.next().unwrap_or(Stage::Report);
        if unlocked == self.completed {
            return false;
        }

        self.completed = unlocked;
        tracing::info!(
            stage = %stage,
            unlocked = %unlocked,
            "Stage completed"
        );
        true
    }

    /// Revisit any unlocked stage. Locked targets are rejected untouched.
    pub fn jump_to(&mut self, target: Stage) -> Result<(), StepError> {
        if self.is_locked(target) {
            return Err(StepError::Locked {
                target,
                completed: self.completed,
            });
        }

        self.current = target;
        Ok(())
    }

    /// Display fact only; there is no terminal state
    pub fn is_pipeline_complete(&self) -> bool {
        self.current.is_final()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn progress(&self) -> StepProgress {
        StepProgress {
            current_step: self.current.ordinal(),
            completed_step: self.completed.ordinal(),
            total_steps: Stage::COUNT,
            pipeline_complete: self.is_pipeline_complete(),
        }
    }

    /// Format progress for display
    /// Returns something like: "Upload > [EDA] > Preprocessing > (Training) > (Report)"
    pub fn format_progress(&self) -> String {
        Stage::all()
            .iter()
            .map(|stage| match self.status(*stage) {
                StepStatus::Active => format!("[{}]", stage.display_name()),
                StepStatus::Locked => format!("({})", stage.display_name()),
                StepStatus::Completed | StepStatus::Available => {
                    stage.display_name().to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unlocked_through(stage: Stage) -> StepManager {
        let mut manager = StepManager::new();
        for s in Stage::all().iter().take_while(|s| **s < stage) {
            manager.on_stage_success(*s);
        }
        manager
    }

    #[test]
    fn test_initial_state() {
        let manager = StepManager::new();
        assert_eq!(manager.current(), Stage::Upload);
        assert_eq!(manager.completed(), Stage::Upload);
        assert!(!manager.is_pipeline_complete());
    }

    #[test]
    fn test_jump_succeeds_iff_unlocked() {
        for completed in Stage::all() {
            for target in Stage::all() {
                let mut manager = unlocked_through(*completed);
                assert_eq!(manager.completed(), *completed);
                let before = manager.clone();

                let result = manager.jump_to(*target);
                if target.ordinal() <= completed.ordinal() {
                    assert!(result.is_ok());
                    assert_eq!(manager.current(), *target);
                } else {
                    assert_eq!(
                        result,
                        Err(StepError::Locked {
                            target: *target,
                            completed: *completed
                        })
                    );
                    assert_eq!(manager, before);
                }
            }
        }
    }

    #[test]
    fn test_stage_success_is_idempotent() {
        for stage in Stage::all() {
            let mut once = unlocked_through(*stage);
            once.on_stage_success(*stage);

            let mut twice = once.clone();
            assert!(!twice.on_stage_success(*stage));
            assert_eq!(twice.completed(), once.completed());
        }
    }

    #[test]
    fn test_stage_success_unlocks_exactly_one() {
        let mut manager = StepManager::new();
        assert!(manager.on_stage_success(Stage::Upload));
        assert_eq!(manager.completed(), Stage::ExploratoryAnalysis);

        // Older stages re-running never regress progression
        manager.on_stage_success(Stage::ExploratoryAnalysis);
        manager.on_stage_success(Stage::Upload);
        assert_eq!(manager.completed(), Stage::Preprocessing);
    }

    #[test]
    fn test_report_success_clamps() {
        let mut manager = unlocked_through(Stage::Report);
        assert!(!manager.on_stage_success(Stage::Report));
        assert_eq!(manager.completed(), Stage::Report);
    }

    #[test]
    fn test_advance_requires_unlock() {
        let mut manager = StepManager::new();
        assert_eq!(
            manager.advance(),
            Err(StepError::Locked {
                target: Stage::ExploratoryAnalysis,
                completed: Stage::Upload
            })
        );
        assert_eq!(manager.current(), Stage::Upload);

        manager.on_stage_success(Stage::Upload);
        assert_eq!(manager.current(), Stage::Upload);
        assert_eq!(manager.advance(), Ok(Stage::ExploratoryAnalysis));
    }

    #[test]
    fn test_advance_at_report_fails() {
        let mut manager = unlocked_through(Stage::Report);
        manager.jump_to(Stage::Report).unwrap();
        assert!(manager.is_pipeline_complete());
        assert_eq!(manager.advance(), Err(StepError::FinalStage));
        assert_eq!(manager.current(), Stage::Report);
    }

    #[test]
    fn test_restore_ignores_everything_but_cache() {
        let data = StepData {
            session_id: Some("11111111-1111-1111-1111-111111111111".to_string()),
            cached: vec![Stage::Upload, Stage::ExploratoryAnalysis],
        };
        let manager = StepManager::restore(&data);
        assert_eq!(manager.completed(), Stage::Preprocessing);
        assert_eq!(manager.current(), Stage::Preprocessing);
    }

    #[test]
    fn test_status_and_progress() {
        let mut manager = unlocked_through(Stage::Preprocessing);
        manager.jump_to(Stage::ExploratoryAnalysis).unwrap();

        assert_eq!(manager.status(Stage::Upload), StepStatus::Completed);
        assert_eq!(manager.status(Stage::ExploratoryAnalysis), StepStatus::Active);
        assert_eq!(manager.status(Stage::Preprocessing), StepStatus::Available);
        assert_eq!(manager.status(Stage::Training), StepStatus::Locked);

        assert_eq!(
            manager.format_progress(),
            "Upload > [EDA] > Preprocessing > (Training) > (Report)"
        );

        let progress = manager.progress();
        assert_eq!(progress.current_step, 2);
        assert_eq!(progress.completed_step, 3);
        assert!(!progress.pipeline_complete);
    }

    #[test]
    fn test_reset() {
        let mut manager = unlocked_through(Stage::Training);
        manager.reset();
        assert_eq!(manager, StepManager::new());
    }
}
