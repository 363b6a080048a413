//! MCP protocol surface for the challan workflow.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData, ServerHandler, ServiceExt,
};
use serde::Serialize;
use tracing::{error, info, warn};

use challan_core::workflow::WorkflowEngine;

use crate::tools::{
    ApproveChallanInput, ChallanIdInput, ChallanTools, CreateChallanInput, DecideChallanInput,
    PendingApprovalsInput, RejectChallanInput, ToolResult, UsernameInput,
};

#[derive(Clone)]
pub struct ChallanMcpServer {
    name: String,
    tools: ChallanTools,
    tool_router: ToolRouter<Self>,
}

impl ChallanMcpServer {
    pub fn new(engine: WorkflowEngine) -> Self {
        Self::with_name("challan-mcp", engine)
    }

    pub fn with_name(name: impl Into<String>, engine: WorkflowEngine) -> Self {
        Self { name: name.into(), tools: ChallanTools::new(engine), tool_router: Self::tool_router() }
    }

    pub fn tools(&self) -> &ChallanTools {
        &self.tools
    }

    /// Serves MCP over stdin/stdout until the client disconnects.
    pub async fn run_stdio(self) -> anyhow::Result<()> {
        info!(event_name = "mcp.server.starting", server = %self.name, "starting stdio transport");

        let service = self.serve(stdio()).await?;
        let reason = service.waiting().await?;

        info!(event_name = "mcp.server.stopped", reason = ?reason, "MCP server shutdown complete");
        Ok(())
    }
}

#[tool_router]
impl ChallanMcpServer {
    #[tool(description = "Submit a new device challan. It starts pending manager approval.")]
    async fn create_challan(
        &self,
        Parameters(input): Parameters<CreateChallanInput>,
    ) -> Result<CallToolResult, ErrorData> {
        respond("create_challan", self.tools.create_challan(input).await)
    }

    #[tool(description = "Get the current status of a challan by id.")]
    async fn get_challan_status(
        &self,
        Parameters(input): Parameters<ChallanIdInput>,
    ) -> Result<CallToolResult, ErrorData> {
        respond("get_challan_status", self.tools.get_challan_status(input).await)
    }

    #[tool(description = "Approve or reject a challan at one approval stage.")]
    async fn decide_challan(
        &self,
        Parameters(input): Parameters<DecideChallanInput>,
    ) -> Result<CallToolResult, ErrorData> {
        respond("decide_challan", self.tools.decide_challan(input).await)
    }

    #[tool(description = "Approve a challan at the given stage (manager, hod or it_admin).")]
    async fn approve_challan(
        &self,
        Parameters(input): Parameters<ApproveChallanInput>,
    ) -> Result<CallToolResult, ErrorData> {
        respond("approve_challan", self.tools.approve_challan(input).await)
    }

    #[tool(description = "Reject a challan at the given stage. A reason is required.")]
    async fn reject_challan(
        &self,
        Parameters(input): Parameters<RejectChallanInput>,
    ) -> Result<CallToolResult, ErrorData> {
        respond("reject_challan", self.tools.reject_challan(input).await)
    }

    #[tool(description = "List every challan submitted by a user, newest first.")]
    async fn list_my_challans(
        &self,
        Parameters(input): Parameters<UsernameInput>,
    ) -> Result<CallToolResult, ErrorData> {
        respond("list_my_challans", self.tools.list_my_challans(input).await)
    }

    #[tool(description = "List every challan from every requester, newest first.")]
    async fn list_all_challans(&self) -> Result<CallToolResult, ErrorData> {
        respond("list_all_challans", self.tools.list_all_challans().await)
    }

    #[tool(description = "List challans waiting on a stage. The username must hold that role.")]
    async fn get_pending_approvals_for_role(
        &self,
        Parameters(input): Parameters<PendingApprovalsInput>,
    ) -> Result<CallToolResult, ErrorData> {
        respond(
            "get_pending_approvals_for_role",
            self.tools.get_pending_approvals_for_role(input).await,
        )
    }

    #[tool(description = "Count challans waiting at each approval stage.")]
    async fn pending_summary(&self) -> Result<CallToolResult, ErrorData> {
        respond("pending_summary", self.tools.pending_summary().await)
    }

    #[tool(description = "List the device catalog grouped by device type.")]
    async fn list_devices(&self) -> Result<CallToolResult, ErrorData> {
        respond("list_devices", self.tools.list_devices().await)
    }
}

#[tool_handler]
impl ServerHandler for ChallanMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::from_build_env()
            },
            instructions: Some(
                "Device challan approvals. Requesters submit challans, then manager, HOD and \
                 IT inventory approve them in that order. A rejection at any stage is final."
                    .to_string(),
            ),
        }
    }
}

/// Expected failures go back to the caller as tool errors; only storage
/// faults are logged at error level.
fn respond<T: Serialize>(tool: &str, result: ToolResult<T>) -> Result<CallToolResult, ErrorData> {
    match result {
        Ok(output) => Ok(CallToolResult::success(vec![Content::text(to_json(&output)?)])),
        Err(failure) => {
            if failure.kind().is_expected() {
                warn!(
                    event_name = "mcp.tool.refused",
                    tool,
                    error_kind = failure.kind().as_str(),
                    error = %failure.error.message,
                    "tool call refused"
                );
            } else {
                error!(
                    event_name = "mcp.tool.failed",
                    tool,
                    error_kind = failure.kind().as_str(),
                    error = %failure.error.message,
                    "tool call failed"
                );
            }
            Ok(CallToolResult::error(vec![Content::text(to_json(&failure)?)]))
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ErrorData> {
    serde_json::to_string_pretty(value)
        .map_err(|error| ErrorData::internal_error(format!("failed to encode result: {error}"), None))
}
