use std::sync::Arc;

use challan_core::config::{AppConfig, ConfigError, LoadOptions};
use challan_core::workflow::WorkflowEngine;
use challan_db::{
    connect_with_config, migrations, DbPool, ReferenceSeed, RepositoryError, SqlChallanStore,
};
use thiserror::Error;
use tracing::info;

use crate::server::ChallanMcpServer;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub server: ChallanMcpServer,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("reference data seeding failed: {0}")]
    Seed(#[source] RepositoryError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    if config.mcp.seed_reference_data {
        let seeded = ReferenceSeed::load(&db_pool).await.map_err(BootstrapError::Seed)?;
        info!(
            event_name = "system.bootstrap.reference_data_seeded",
            identities = seeded.identities,
            devices = seeded.devices,
            "reference identities and devices loaded"
        );
    }

    let engine = WorkflowEngine::new(Arc::new(SqlChallanStore::new(db_pool.clone())));
    let server = ChallanMcpServer::with_name(config.mcp.server_name.clone(), engine);

    Ok(Application { config, db_pool, server })
}
