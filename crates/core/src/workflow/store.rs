use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::challan::{Challan, ChallanId, Decision, NewChallan, Stage};
use crate::domain::device::DeviceCatalogEntry;
use crate::domain::identity::Identity;
use crate::errors::StoreError;
use crate::workflow::guard::stage_is_open;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChallanFilter {
    pub requested_by: Option<String>,
    /// Only challans whose `pending_for` stage is currently open.
    pub pending_for: Option<Stage>,
}

impl ChallanFilter {
    pub fn requested_by(username: impl Into<String>) -> Self {
        Self { requested_by: Some(username.into()), pending_for: None }
    }

    pub fn pending_for(stage: Stage) -> Self {
        Self { requested_by: None, pending_for: Some(stage) }
    }

    pub fn matches(&self, challan: &Challan) -> bool {
        let requester_ok =
            self.requested_by.as_deref().map_or(true, |username| challan.requested_by == username);
        let stage_ok =
            self.pending_for.map_or(true, |stage| stage_is_open(&challan.statuses(), stage));
        requester_ok && stage_ok
    }
}

/// A single stage decision to persist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageUpdate {
    pub challan_id: ChallanId,
    pub stage: Stage,
    pub decision: Decision,
    pub decided_at: DateTime<Utc>,
    pub remarks: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageUpdateOutcome {
    Applied(Challan),
    NotFound,
    /// The stage was not open when the write was attempted; carries the
    /// snapshot that failed the guard.
    GuardRejected(Challan),
}

/// Persistence contract required by the workflow engine.
///
/// `update_stage` must evaluate the stage guard and write the stage record
/// plus the recomputed final status as one atomic unit, so that two racing
/// decisions on the same stage produce exactly one `Applied`.
#[async_trait]
pub trait ChallanStore: Send + Sync {
    async fn insert(&self, challan: NewChallan) -> Result<ChallanId, StoreError>;

    async fn get(&self, id: ChallanId) -> Result<Option<Challan>, StoreError>;

    /// Newest creation timestamp first.
    async fn list(&self, filter: &ChallanFilter) -> Result<Vec<Challan>, StoreError>;

    async fn update_stage(&self, update: StageUpdate) -> Result<StageUpdateOutcome, StoreError>;

    async fn lookup_identity(&self, username: &str) -> Result<Option<Identity>, StoreError>;

    async fn list_device_catalog(&self) -> Result<Vec<DeviceCatalogEntry>, StoreError>;
}
