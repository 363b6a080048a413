//! Challan MCP Server Binary
//!
//! ## Usage
//!
//! ```bash
//! # Default database (sqlite://challan.db)
//! challan-mcp
//!
//! # Specific database, seeded with the demo users and device catalog
//! CHALLAN_DATABASE_URL=sqlite://demo.db CHALLAN_MCP_SEED_REFERENCE_DATA=true challan-mcp
//! ```

use anyhow::Result;
use challan_core::config::{AppConfig, LoadOptions};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    challan_mcp::init_logging(&config);

    info!(
        event_name = "mcp.server.configured",
        database_url = %config.database.url,
        seed_reference_data = config.mcp.seed_reference_data,
        "starting challan MCP server"
    );

    let app = challan_mcp::bootstrap_with_config(config).await?;
    app.server.run_stdio().await
}
