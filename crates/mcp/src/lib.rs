//! Challan MCP (Model Context Protocol) Server
//!
//! Exposes the device challan approval workflow to AI agents over MCP.
//! Requesters submit challans; manager, HOD and IT inventory approve them in
//! that order, and any rejection ends the workflow.
//!
//! ## Architecture
//!
//! - `ChallanMcpServer`: rmcp server binding the tools to the protocol
//! - `tools`: transport-agnostic handlers with typed inputs and outputs
//! - `bootstrap`: config, database, migrations and optional reference seed
//!
//! ## Example Usage
//!
//! ```no_run
//! use challan_core::config::LoadOptions;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = challan_mcp::bootstrap(LoadOptions::default()).await?;
//!     app.server.run_stdio().await
//! }
//! ```

mod bootstrap;
mod server;
pub mod tools;

pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};
pub use server::ChallanMcpServer;
pub use tools::{ChallanTools, ToolFailure, ToolResult, ALL_TOOL_NAMES, TOTAL_TOOLS};

use challan_core::config::{AppConfig, LogFormat};

/// Installs the global subscriber. Output goes to stderr because stdout
/// carries the MCP protocol stream.
pub fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}
