//! Guard table for the three-stage approval state machine.
//!
//! | stage    | open when                                   |
//! |----------|---------------------------------------------|
//! | manager  | manager pending                             |
//! | hod      | manager approved, hod pending               |
//! | it_admin | manager and hod approved, it_admin pending  |
//!
//! All three rows are the same rule: every preceding stage approved and the
//! stage itself still pending.

use serde::{Deserialize, Serialize};

use crate::domain::challan::{Decision, FinalStatus, Stage, StageStatus, StageStatuses};

pub fn stage_is_open(statuses: &StageStatuses, stage: Stage) -> bool {
    statuses.get(stage) == StageStatus::Pending
        && stage.preceding().iter().all(|prior| statuses.get(*prior) == StageStatus::Approved)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub stage: Stage,
    pub decision: Decision,
    pub to: StageStatuses,
    pub final_status: FinalStatus,
}

/// Moves exactly one coordinate of the status tuple, or returns `None` when
/// the guard for `stage` is not satisfied.
pub fn transition(
    current: &StageStatuses,
    stage: Stage,
    decision: Decision,
) -> Option<StageTransition> {
    if !stage_is_open(current, stage) {
        return None;
    }

    let to = current.with(stage, decision.as_status());
    Some(StageTransition { stage, decision, to, final_status: to.final_status() })
}
