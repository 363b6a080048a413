//! Typed handlers behind the MCP tools.
//!
//! Each handler parses and validates its input, calls the workflow engine and
//! returns a serializable output or a [`ToolFailure`]. Nothing here knows about
//! the transport; `server.rs` binds these to rmcp.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rmcp::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

use challan_core::domain::challan::{Challan, ChallanId, Decision, Stage, StageStatus};
use challan_core::domain::device::DeviceCatalogEntry;
use challan_core::errors::{ErrorKind, WorkflowError};
use challan_core::workflow::{DecideChallan, PendingSummary, SubmitChallan, WorkflowEngine};

/// Tool names grouped the way clients list them.
pub trait ToolCategory {
    fn category_name() -> &'static str
    where
        Self: Sized;
    fn tool_names() -> &'static [&'static str]
    where
        Self: Sized;
}

pub struct RequestTools;
pub struct ApprovalTools;
pub struct ReferenceTools;

impl ToolCategory for RequestTools {
    fn category_name() -> &'static str {
        "request"
    }
    fn tool_names() -> &'static [&'static str] {
        &["create_challan", "get_challan_status", "list_my_challans", "list_all_challans"]
    }
}

impl ToolCategory for ApprovalTools {
    fn category_name() -> &'static str {
        "approval"
    }
    fn tool_names() -> &'static [&'static str] {
        &[
            "decide_challan",
            "approve_challan",
            "reject_challan",
            "get_pending_approvals_for_role",
            "pending_summary",
        ]
    }
}

impl ToolCategory for ReferenceTools {
    fn category_name() -> &'static str {
        "reference"
    }
    fn tool_names() -> &'static [&'static str] {
        &["list_devices"]
    }
}

pub const ALL_TOOL_NAMES: &[&str] = &[
    "create_challan",
    "get_challan_status",
    "list_my_challans",
    "list_all_challans",
    "decide_challan",
    "approve_challan",
    "reject_challan",
    "get_pending_approvals_for_role",
    "pending_summary",
    "list_devices",
];

pub const TOTAL_TOOLS: usize = ALL_TOOL_NAMES.len();

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateChallanInput {
    #[schemars(description = "Device type, e.g. phone or tablet")]
    pub device_type: String,
    #[schemars(description = "Device model, e.g. Samsung Galaxy S23")]
    pub device_model: String,
    #[schemars(description = "Unique device serial number")]
    pub serial_number: String,
    #[schemars(description = "Number of devices requested (positive)")]
    pub quantity: i64,
    #[schemars(description = "Why the devices are needed")]
    pub purpose: String,
    #[schemars(description = "Username of the requester")]
    pub requested_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChallanIdInput {
    #[schemars(description = "Numeric challan id")]
    pub challan_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DecideChallanInput {
    pub challan_id: i64,
    #[schemars(description = "Approval stage: manager, hod or it_admin")]
    pub role: String,
    #[schemars(description = "Username of the person deciding")]
    pub actor_username: String,
    #[schemars(description = "approve or reject")]
    pub decision: String,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApproveChallanInput {
    pub challan_id: i64,
    #[schemars(description = "Approval stage: manager, hod or it_admin")]
    pub role: String,
    pub approver_username: String,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RejectChallanInput {
    pub challan_id: i64,
    #[schemars(description = "Approval stage: manager, hod or it_admin")]
    pub role: String,
    pub rejecter_username: String,
    #[schemars(description = "Reason for the rejection (required)")]
    pub rejection_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UsernameInput {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PendingApprovalsInput {
    #[schemars(description = "Approval stage: manager, hod or it_admin")]
    pub role: String,
    #[schemars(description = "Username that must hold the role")]
    pub username: String,
}

// ============================================================================
// Outputs
// ============================================================================

/// Challan snapshot plus the derived progress fields callers display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallanView {
    #[serde(flatten)]
    pub challan: Challan,
    pub awaiting_stage: Option<Stage>,
    pub progress: String,
}

impl From<Challan> for ChallanView {
    fn from(challan: Challan) -> Self {
        Self { awaiting_stage: challan.awaiting_stage(), progress: progress(&challan), challan }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateChallanOutput {
    pub id: ChallanId,
    pub final_status: StageStatus,
    pub awaiting_stage: Option<Stage>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutput {
    pub challan: ChallanView,
    pub next_stage: Option<Stage>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallanListOutput {
    pub count: usize,
    pub challans: Vec<ChallanView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceListOutput {
    pub total: usize,
    pub devices: Vec<DeviceCatalogEntry>,
    pub by_type: BTreeMap<String, Vec<DeviceCatalogEntry>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSummaryOutput {
    pub manager_pending: usize,
    pub hod_pending: usize,
    pub it_pending: usize,
    pub total_pending: usize,
    pub last_updated: DateTime<Utc>,
}

impl From<PendingSummary> for PendingSummaryOutput {
    fn from(summary: PendingSummary) -> Self {
        Self {
            manager_pending: summary.manager_pending,
            hod_pending: summary.hod_pending,
            it_pending: summary.it_pending,
            total_pending: summary.total_pending,
            last_updated: summary.last_updated,
        }
    }
}

/// Error payload returned to tool callers as `{"error": {"kind", "message"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub error: ToolFailureBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailureBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl ToolFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind
    }

    fn validation(message: impl Into<String>) -> Self {
        Self { error: ToolFailureBody { kind: ErrorKind::Validation, message: message.into() } }
    }
}

impl From<WorkflowError> for ToolFailure {
    fn from(error: WorkflowError) -> Self {
        Self { error: ToolFailureBody { kind: error.kind(), message: error.to_string() } }
    }
}

pub type ToolResult<T> = Result<T, ToolFailure>;

// ============================================================================
// Handlers
// ============================================================================

#[derive(Clone)]
pub struct ChallanTools {
    engine: WorkflowEngine,
}

impl ChallanTools {
    pub fn new(engine: WorkflowEngine) -> Self {
        Self { engine }
    }

    pub async fn create_challan(&self, input: CreateChallanInput) -> ToolResult<CreateChallanOutput> {
        let id = self
            .engine
            .submit(SubmitChallan {
                device_type: input.device_type,
                device_model: input.device_model,
                serial_number: input.serial_number,
                quantity: input.quantity,
                purpose: input.purpose,
                requested_by: input.requested_by,
            })
            .await?;
        let challan = self.engine.status_of(id).await?;

        Ok(CreateChallanOutput {
            id,
            final_status: challan.final_status,
            awaiting_stage: challan.awaiting_stage(),
            message: format!("Challan {id} created; {}", progress(&challan)),
        })
    }

    pub async fn get_challan_status(&self, input: ChallanIdInput) -> ToolResult<ChallanView> {
        Ok(self.engine.status_of(ChallanId(input.challan_id)).await?.into())
    }

    pub async fn decide_challan(&self, input: DecideChallanInput) -> ToolResult<DecisionOutput> {
        let stage = input.role.parse::<Stage>().map_err(WorkflowError::from)?;
        let decision = input.decision.parse::<Decision>().map_err(WorkflowError::from)?;
        self.decide(input.challan_id, stage, decision, input.actor_username, input.remarks).await
    }

    pub async fn approve_challan(&self, input: ApproveChallanInput) -> ToolResult<DecisionOutput> {
        let stage = input.role.parse::<Stage>().map_err(WorkflowError::from)?;
        self.decide(input.challan_id, stage, Decision::Approved, input.approver_username, input.remarks)
            .await
    }

    pub async fn reject_challan(&self, input: RejectChallanInput) -> ToolResult<DecisionOutput> {
        let stage = input.role.parse::<Stage>().map_err(WorkflowError::from)?;
        if input.rejection_reason.trim().is_empty() {
            return Err(ToolFailure::validation("`rejection_reason` must not be empty"));
        }
        self.decide(
            input.challan_id,
            stage,
            Decision::Rejected,
            input.rejecter_username,
            Some(input.rejection_reason),
        )
        .await
    }

    pub async fn list_my_challans(&self, input: UsernameInput) -> ToolResult<ChallanListOutput> {
        let challans = self.engine.list_for_requester(&input.username).await?;
        Ok(list_output(challans))
    }

    /// Administrative view: every challan, newest first.
    pub async fn list_all_challans(&self) -> ToolResult<ChallanListOutput> {
        let challans = self.engine.list_for(None).await?;
        Ok(list_output(challans))
    }

    pub async fn get_pending_approvals_for_role(
        &self,
        input: PendingApprovalsInput,
    ) -> ToolResult<ChallanListOutput> {
        let stage = input.role.parse::<Stage>().map_err(WorkflowError::from)?;
        let challans = self.engine.pending_for_actor(stage, &input.username).await?;
        Ok(list_output(challans))
    }

    pub async fn list_devices(&self) -> ToolResult<DeviceListOutput> {
        let devices = self.engine.device_catalog().await?;
        let mut by_type: BTreeMap<String, Vec<DeviceCatalogEntry>> = BTreeMap::new();
        for device in &devices {
            by_type.entry(device.device_type.clone()).or_default().push(device.clone());
        }

        Ok(DeviceListOutput { total: devices.len(), devices, by_type })
    }

    pub async fn pending_summary(&self) -> ToolResult<PendingSummaryOutput> {
        Ok(self.engine.pending_summary().await?.into())
    }

    async fn decide(
        &self,
        challan_id: i64,
        stage: Stage,
        decision: Decision,
        actor: String,
        remarks: Option<String>,
    ) -> ToolResult<DecisionOutput> {
        let challan = self
            .engine
            .decide(DecideChallan {
                challan_id: ChallanId(challan_id),
                stage,
                decision,
                actor: actor.clone(),
                remarks,
            })
            .await?;

        let view = ChallanView::from(challan);
        let message = format!(
            "Challan {challan_id} {} at {} level by {actor}; {}",
            decision.as_str(),
            stage.label(),
            view.progress
        );
        Ok(DecisionOutput { next_stage: view.awaiting_stage, challan: view, message })
    }
}

fn list_output(challans: Vec<Challan>) -> ChallanListOutput {
    let challans = challans.into_iter().map(ChallanView::from).collect::<Vec<_>>();
    ChallanListOutput { count: challans.len(), challans }
}

/// Human-readable progress line for a challan.
pub fn progress(challan: &Challan) -> String {
    match challan.final_status {
        StageStatus::Approved => "fully approved, device is ready for allocation".to_string(),
        StageStatus::Rejected => {
            let stage = Stage::ALL
                .into_iter()
                .find(|stage| challan.stage(*stage).status == StageStatus::Rejected);
            match stage {
                Some(stage) => format!("rejected at {} level", stage.label()),
                None => "rejected".to_string(),
            }
        }
        StageStatus::Pending => match challan.awaiting_stage() {
            Some(stage) => format!("waiting for {} approval", stage.label()),
            None => "pending".to_string(),
        },
    }
}
