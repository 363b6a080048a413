use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::identity::Role;
use crate::errors::DomainError;
use crate::workflow::guard::stage_is_open;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallanId(pub i64);

impl fmt::Display for ChallanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the three sequential approval checkpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Manager,
    Hod,
    ItAdmin,
}

impl Stage {
    /// Stages in workflow order.
    pub const ALL: [Stage; 3] = [Stage::Manager, Stage::Hod, Stage::ItAdmin];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::Hod => "hod",
            Self::ItAdmin => "it_admin",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Manager => "Manager",
            Self::Hod => "HOD",
            Self::ItAdmin => "IT Inventory",
        }
    }

    /// The identity role allowed to decide this stage.
    pub fn approver_role(self) -> Role {
        match self {
            Self::Manager => Role::Manager,
            Self::Hod => Role::Hod,
            Self::ItAdmin => Role::ItAdmin,
        }
    }

    /// Stages that must be approved before this one opens.
    pub fn preceding(self) -> &'static [Stage] {
        match self {
            Self::Manager => &[],
            Self::Hod => &[Stage::Manager],
            Self::ItAdmin => &[Stage::Manager, Stage::Hod],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "manager" => Ok(Self::Manager),
            "hod" => Ok(Self::Hod),
            "it_admin" | "it" => Ok(Self::ItAdmin),
            other => Err(DomainError::UnknownStage(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Approved,
    Rejected,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for StageStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// An approver's verdict on one stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn as_status(self) -> StageStatus {
        match self {
            Self::Approved => StageStatus::Approved,
            Self::Rejected => StageStatus::Rejected,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.as_status().as_str()
    }
}

impl FromStr for Decision {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Ok(Self::Approved),
            "reject" | "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::UnknownDecision(other.to_string())),
        }
    }
}

pub type FinalStatus = StageStatus;

/// The (manager, hod, it_admin) status tuple that drives the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStatuses {
    pub manager: StageStatus,
    pub hod: StageStatus,
    pub it_admin: StageStatus,
}

impl Default for StageStatuses {
    fn default() -> Self {
        Self {
            manager: StageStatus::Pending,
            hod: StageStatus::Pending,
            it_admin: StageStatus::Pending,
        }
    }
}

impl StageStatuses {
    pub fn get(&self, stage: Stage) -> StageStatus {
        match stage {
            Stage::Manager => self.manager,
            Stage::Hod => self.hod,
            Stage::ItAdmin => self.it_admin,
        }
    }

    pub fn with(mut self, stage: Stage, status: StageStatus) -> Self {
        match stage {
            Stage::Manager => self.manager = status,
            Stage::Hod => self.hod = status,
            Stage::ItAdmin => self.it_admin = status,
        }
        self
    }

    /// Rejected if any stage is rejected, approved if all are approved,
    /// pending otherwise.
    pub fn final_status(&self) -> FinalStatus {
        let statuses = Stage::ALL.map(|stage| self.get(stage));
        if statuses.contains(&StageStatus::Rejected) {
            StageStatus::Rejected
        } else if statuses.iter().all(|status| *status == StageStatus::Approved) {
            StageStatus::Approved
        } else {
            StageStatus::Pending
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub status: StageStatus,
    pub decided_at: Option<DateTime<Utc>>,
}

impl StageRecord {
    pub fn pending() -> Self {
        Self { status: StageStatus::Pending, decided_at: None }
    }
}

/// Fields supplied when a challan is submitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChallan {
    pub device_type: String,
    pub device_model: String,
    pub serial_number: String,
    pub quantity: i64,
    pub purpose: String,
    pub requested_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challan {
    pub id: ChallanId,
    pub device_type: String,
    pub device_model: String,
    pub serial_number: String,
    pub quantity: i64,
    pub purpose: String,
    pub requested_by: String,
    pub created_at: DateTime<Utc>,
    pub manager: StageRecord,
    pub hod: StageRecord,
    pub it_admin: StageRecord,
    pub final_status: FinalStatus,
    pub remarks: Option<String>,
}

impl Challan {
    pub fn stage(&self, stage: Stage) -> &StageRecord {
        match stage {
            Stage::Manager => &self.manager,
            Stage::Hod => &self.hod,
            Stage::ItAdmin => &self.it_admin,
        }
    }

    pub fn statuses(&self) -> StageStatuses {
        StageStatuses {
            manager: self.manager.status,
            hod: self.hod.status,
            it_admin: self.it_admin.status,
        }
    }

    /// The stage currently open for a decision, if any.
    pub fn awaiting_stage(&self) -> Option<Stage> {
        let statuses = self.statuses();
        Stage::ALL.into_iter().find(|stage| stage_is_open(&statuses, *stage))
    }

    pub fn is_terminal(&self) -> bool {
        self.final_status != StageStatus::Pending
    }

    /// True when the stored final status matches the stage tuple.
    pub fn final_status_consistent(&self) -> bool {
        self.final_status == self.statuses().final_status()
    }
}
