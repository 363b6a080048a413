use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::challan::Stage;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Requester,
    Manager,
    Hod,
    ItAdmin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requester => "requester",
            Self::Manager => "manager",
            Self::Hod => "hod",
            Self::ItAdmin => "it_admin",
        }
    }

    /// The approval stage this role decides, if it is an approver role.
    pub fn stage(self) -> Option<Stage> {
        match self {
            Self::Requester => None,
            Self::Manager => Some(Stage::Manager),
            Self::Hod => Some(Stage::Hod),
            Self::ItAdmin => Some(Stage::ItAdmin),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            // `user` is the legacy spelling used by older identity exports.
            "requester" | "user" => Ok(Self::Requester),
            "manager" => Ok(Self::Manager),
            "hod" => Ok(Self::Hod),
            "it_admin" => Ok(Self::ItAdmin),
            other => Err(DomainError::UnknownRole(other.to_string())),
        }
    }
}

/// A provisioned principal. Read-only to the workflow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub department: String,
}

impl Identity {
    pub fn can_decide(&self, stage: Stage) -> bool {
        self.role == stage.approver_role()
    }
}
