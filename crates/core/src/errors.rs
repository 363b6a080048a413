use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::challan::{ChallanId, Stage, StageStatuses};
use crate::domain::identity::Role;

/// Failures parsing workflow vocabulary (stages, statuses, roles, decisions).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown approval stage `{0}` (expected manager|hod|it_admin)")]
    UnknownStage(String),
    #[error("unknown stage status `{0}` (expected pending|approved|rejected)")]
    UnknownStatus(String),
    #[error("unknown decision `{0}` (expected approved|rejected)")]
    UnknownDecision(String),
    #[error("unknown role `{0}` (expected requester|manager|hod|it_admin)")]
    UnknownRole(String),
}

/// Failures reported by a [`crate::workflow::ChallanStore`] implementation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("serial number `{0}` is already registered")]
    DuplicateSerialNumber(String),
    #[error("quantity must be a positive integer, got {0}")]
    InvalidQuantity(i64),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored record could not be decoded: {0}")]
    Decode(String),
}

/// Caller-facing classification of a [`WorkflowError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Authorization,
    SequenceViolation,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Authorization => "authorization",
            Self::SequenceViolation => "sequence_violation",
            Self::Storage => "storage",
        }
    }

    /// Expected conditions are reported back to the caller; storage faults are not.
    pub fn is_expected(self) -> bool {
        !matches!(self, Self::Storage)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("challan {0} not found")]
    RequestNotFound(ChallanId),
    #[error("requester `{0}` not found")]
    UnknownRequester(String),
    #[error("user `{0}` not found")]
    UnknownActor(String),
    #[error("user `{actor}` has role `{actor_role}` and cannot act as `{stage}`")]
    RoleMismatch { actor: String, actor_role: Role, stage: Stage },
    #[error(
        "{} decision on challan {challan_id} is out of order (manager={}, hod={}, it_admin={})",
        .stage.label(),
        .current.manager.as_str(),
        .current.hod.as_str(),
        .current.it_admin.as_str()
    )]
    OutOfOrderApproval { challan_id: ChallanId, stage: Stage, current: StageStatuses },
    #[error("serial number `{0}` is already registered")]
    DuplicateSerialNumber(String),
    #[error("quantity must be a positive integer, got {0}")]
    InvalidQuantity(i64),
    #[error("serial number must not be empty")]
    EmptySerialNumber,
    #[error("`{0}` must not be empty")]
    MissingField(&'static str),
    #[error(transparent)]
    InvalidArgument(#[from] DomainError),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RequestNotFound(_) | Self::UnknownRequester(_) | Self::UnknownActor(_) => {
                ErrorKind::NotFound
            }
            Self::DuplicateSerialNumber(_)
            | Self::InvalidQuantity(_)
            | Self::EmptySerialNumber
            | Self::MissingField(_)
            | Self::InvalidArgument(_) => ErrorKind::Validation,
            Self::RoleMismatch { .. } => ErrorKind::Authorization,
            Self::OutOfOrderApproval { .. } => ErrorKind::SequenceViolation,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::DuplicateSerialNumber(serial) => Self::DuplicateSerialNumber(serial),
            StoreError::InvalidQuantity(quantity) => Self::InvalidQuantity(quantity),
            other @ (StoreError::Unavailable(_) | StoreError::Decode(_)) => {
                Self::Storage(other.to_string())
            }
        }
    }
}
