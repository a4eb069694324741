//! Step progression: the fixed stages, the cache-derived progression and the
//! state machine that gates navigation between stages

pub mod cache;
pub mod manager;
pub mod session;
pub mod stage;

pub use cache::StepData;
pub use manager::{StepError, StepManager, StepProgress, StepStatus};
pub use session::{InFlight, PendingGuard};
pub use stage::Stage;
