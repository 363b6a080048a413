use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink};
use crate::domain::challan::{Challan, ChallanId, Decision, NewChallan, Stage};
use crate::domain::device::DeviceCatalogEntry;
use crate::domain::identity::Identity;
use crate::errors::WorkflowError;
use crate::workflow::guard::stage_is_open;
use crate::workflow::store::{ChallanFilter, ChallanStore, StageUpdate, StageUpdateOutcome};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitChallan {
    pub device_type: String,
    pub device_model: String,
    pub serial_number: String,
    pub quantity: i64,
    pub purpose: String,
    pub requested_by: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecideChallan {
    pub challan_id: ChallanId,
    pub stage: Stage,
    pub decision: Decision,
    pub actor: String,
    pub remarks: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSummary {
    pub manager_pending: usize,
    pub hod_pending: usize,
    pub it_pending: usize,
    pub total_pending: usize,
    pub last_updated: DateTime<Utc>,
}

/// Stateless approval workflow over a shared [`ChallanStore`].
#[derive(Clone)]
pub struct WorkflowEngine {
    store: Arc<dyn ChallanStore>,
    audit: Arc<dyn AuditSink>,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn ChallanStore>) -> Self {
        Self { store, audit: Arc::new(NoopAuditSink) }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub async fn submit(&self, request: SubmitChallan) -> Result<ChallanId, WorkflowError> {
        let serial_number = request.serial_number.trim().to_string();
        if serial_number.is_empty() {
            return Err(WorkflowError::EmptySerialNumber);
        }
        if request.quantity <= 0 {
            return Err(WorkflowError::InvalidQuantity(request.quantity));
        }
        let device_type = required(request.device_type, "device_type")?;
        let device_model = required(request.device_model, "device_model")?;
        let purpose = required(request.purpose, "purpose")?;

        let requester = self
            .store
            .lookup_identity(&request.requested_by)
            .await?
            .ok_or_else(|| WorkflowError::UnknownRequester(request.requested_by.clone()))?;

        let id = self
            .store
            .insert(NewChallan {
                device_type,
                device_model,
                serial_number,
                quantity: request.quantity,
                purpose,
                requested_by: requester.username.clone(),
                created_at: Utc::now(),
            })
            .await?;

        info!(
            event_name = "workflow.challan.submitted",
            challan_id = %id,
            requested_by = %requester.username,
            "challan submitted"
        );
        self.audit.emit(AuditEvent::new(
            Some(id),
            "challan.submitted",
            AuditCategory::Submission,
            requester.username,
            AuditOutcome::Success,
        ));

        Ok(id)
    }

    /// Applies one stage decision. Checks run in order: challan exists, actor
    /// exists, actor holds the stage's role, stage guard.
    pub async fn decide(&self, command: DecideChallan) -> Result<Challan, WorkflowError> {
        let result = self.try_decide(&command).await;

        match &result {
            Ok(challan) => {
                let next = challan.awaiting_stage().map_or("none", Stage::as_str);
                info!(
                    event_name = "workflow.decision.applied",
                    challan_id = %command.challan_id,
                    stage = %command.stage,
                    decision = command.decision.as_str(),
                    actor = %command.actor,
                    final_status = challan.final_status.as_str(),
                    "stage decision applied"
                );
                self.audit.emit(
                    decision_event(&command, "challan.decision_applied", AuditOutcome::Success)
                        .with_metadata("final_status", challan.final_status.as_str())
                        .with_metadata("next_stage", next),
                );
            }
            Err(error) => {
                info!(
                    event_name = "workflow.decision.refused",
                    challan_id = %command.challan_id,
                    stage = %command.stage,
                    actor = %command.actor,
                    error_kind = error.kind().as_str(),
                    error = %error,
                    "stage decision refused"
                );
                self.audit.emit(
                    decision_event(&command, "challan.decision_refused", AuditOutcome::Rejected)
                        .with_metadata("error_kind", error.kind().as_str())
                        .with_metadata("error", error.to_string()),
                );
            }
        }

        result
    }

    async fn try_decide(&self, command: &DecideChallan) -> Result<Challan, WorkflowError> {
        let challan = self
            .store
            .get(command.challan_id)
            .await?
            .ok_or(WorkflowError::RequestNotFound(command.challan_id))?;

        let actor = self.identity(&command.actor).await?;
        if !actor.can_decide(command.stage) {
            return Err(WorkflowError::RoleMismatch {
                actor: actor.username,
                actor_role: actor.role,
                stage: command.stage,
            });
        }

        if !stage_is_open(&challan.statuses(), command.stage) {
            return Err(out_of_order(&challan, command.stage));
        }

        let update = StageUpdate {
            challan_id: command.challan_id,
            stage: command.stage,
            decision: command.decision,
            decided_at: Utc::now(),
            remarks: command
                .remarks
                .as_deref()
                .map(str::trim)
                .filter(|remarks| !remarks.is_empty())
                .map(str::to_string),
        };

        match self.store.update_stage(update).await? {
            StageUpdateOutcome::Applied(updated) => Ok(updated),
            StageUpdateOutcome::NotFound => Err(WorkflowError::RequestNotFound(command.challan_id)),
            StageUpdateOutcome::GuardRejected(current) => {
                debug!(
                    event_name = "workflow.decision.lost_race",
                    challan_id = %command.challan_id,
                    stage = %command.stage,
                    "stage closed between read and conditional write"
                );
                Err(out_of_order(&current, command.stage))
            }
        }
    }

    pub async fn pending_for(&self, stage: Stage) -> Result<Vec<Challan>, WorkflowError> {
        Ok(self.store.list(&ChallanFilter::pending_for(stage)).await?)
    }

    /// Pending work for `stage`, provided `actor` holds that stage's role.
    pub async fn pending_for_actor(
        &self,
        stage: Stage,
        actor: &str,
    ) -> Result<Vec<Challan>, WorkflowError> {
        let identity = self.identity(actor).await?;
        if !identity.can_decide(stage) {
            return Err(WorkflowError::RoleMismatch {
                actor: identity.username,
                actor_role: identity.role,
                stage,
            });
        }
        self.pending_for(stage).await
    }

    pub async fn status_of(&self, id: ChallanId) -> Result<Challan, WorkflowError> {
        self.store.get(id).await?.ok_or(WorkflowError::RequestNotFound(id))
    }

    /// All challans when `requester` is `None`.
    pub async fn list_for(&self, requester: Option<&str>) -> Result<Vec<Challan>, WorkflowError> {
        let filter = requester.map(ChallanFilter::requested_by).unwrap_or_default();
        Ok(self.store.list(&filter).await?)
    }

    pub async fn list_for_requester(&self, username: &str) -> Result<Vec<Challan>, WorkflowError> {
        let requester = self
            .store
            .lookup_identity(username)
            .await?
            .ok_or_else(|| WorkflowError::UnknownRequester(username.to_string()))?;
        self.list_for(Some(&requester.username)).await
    }

    pub async fn pending_summary(&self) -> Result<PendingSummary, WorkflowError> {
        let manager_pending = self.pending_for(Stage::Manager).await?.len();
        let hod_pending = self.pending_for(Stage::Hod).await?.len();
        let it_pending = self.pending_for(Stage::ItAdmin).await?.len();

        Ok(PendingSummary {
            manager_pending,
            hod_pending,
            it_pending,
            total_pending: manager_pending + hod_pending + it_pending,
            last_updated: Utc::now(),
        })
    }

    pub async fn device_catalog(&self) -> Result<Vec<DeviceCatalogEntry>, WorkflowError> {
        Ok(self.store.list_device_catalog().await?)
    }

    pub async fn identity(&self, username: &str) -> Result<Identity, WorkflowError> {
        self.store
            .lookup_identity(username)
            .await?
            .ok_or_else(|| WorkflowError::UnknownActor(username.to_string()))
    }
}

fn required(value: String, field: &'static str) -> Result<String, WorkflowError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

fn out_of_order(challan: &Challan, stage: Stage) -> WorkflowError {
    WorkflowError::OutOfOrderApproval { challan_id: challan.id, stage, current: challan.statuses() }
}

fn decision_event(command: &DecideChallan, event_type: &str, outcome: AuditOutcome) -> AuditEvent {
    AuditEvent::new(
        Some(command.challan_id),
        event_type,
        AuditCategory::Decision,
        command.actor.clone(),
        outcome,
    )
    .with_metadata("stage", command.stage.as_str())
    .with_metadata("decision", command.decision.as_str())
}
