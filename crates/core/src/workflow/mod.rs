pub mod engine;
pub mod guard;
pub mod store;

pub use engine::{DecideChallan, PendingSummary, SubmitChallan, WorkflowEngine};
pub use guard::{stage_is_open, transition, StageTransition};
pub use store::{ChallanFilter, ChallanStore, StageUpdate, StageUpdateOutcome};
