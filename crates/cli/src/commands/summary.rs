use std::sync::Arc;

use crate::commands::{prepare, CommandResult, StepFailure};
use challan_core::workflow::{PendingSummary, WorkflowEngine};
use challan_db::{connect_with_config, migrations, SqlChallanStore};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("summary") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let engine = WorkflowEngine::new(Arc::new(SqlChallanStore::new(pool.clone())));
        let summary = engine
            .pending_summary()
            .await
            .map_err(|error| ("workflow_query", error.to_string(), 7u8))?;

        pool.close().await;
        Ok::<PendingSummary, StepFailure>(summary)
    });

    match result {
        Ok(summary) => CommandResult::success("summary", render(&summary)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("summary", error_class, message, exit_code)
        }
    }
}

fn render(summary: &PendingSummary) -> String {
    format!(
        "pending approvals: manager={} hod={} it_admin={} total={} (as of {})",
        summary.manager_pending,
        summary.hod_pending,
        summary.it_pending,
        summary.total_pending,
        summary.last_updated.to_rfc3339()
    )
}
