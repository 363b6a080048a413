pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod workflow;

pub use audit::{AuditEvent, AuditSink, InMemoryAuditSink, NoopAuditSink};
pub use domain::challan::{
    Challan, ChallanId, Decision, FinalStatus, NewChallan, Stage, StageRecord, StageStatus,
    StageStatuses,
};
pub use domain::device::DeviceCatalogEntry;
pub use domain::identity::{Identity, Role};
pub use errors::{DomainError, ErrorKind, StoreError, WorkflowError};
pub use workflow::{
    ChallanFilter, ChallanStore, DecideChallan, PendingSummary, StageUpdate, StageUpdateOutcome,
    SubmitChallan, WorkflowEngine,
};
