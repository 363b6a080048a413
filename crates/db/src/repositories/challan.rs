use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use challan_core::domain::challan::{
    Challan, ChallanId, NewChallan, Stage, StageRecord, StageStatus,
};
use challan_core::domain::device::DeviceCatalogEntry;
use challan_core::domain::identity::{Identity, Role};
use challan_core::errors::StoreError;
use challan_core::workflow::{ChallanFilter, ChallanStore, StageUpdate, StageUpdateOutcome};

use super::RepositoryError;
use crate::DbPool;

const CHALLAN_COLUMNS: &str = "id, device_type, device_model, serial_number, quantity, purpose,
     requested_by, created_at, manager_status, manager_decided_at, hod_status, hod_decided_at,
     it_admin_status, it_admin_decided_at, final_status, remarks";

const RECOMPUTE_FINAL_STATUS: &str = "UPDATE challans SET final_status = CASE
         WHEN manager_status = 'rejected' OR hod_status = 'rejected'
              OR it_admin_status = 'rejected' THEN 'rejected'
         WHEN manager_status = 'approved' AND hod_status = 'approved'
              AND it_admin_status = 'approved' THEN 'approved'
         ELSE 'pending'
     END
     WHERE id = ?";

/// SQL form of the stage guard: every preceding stage approved and the
/// stage itself still pending.
pub fn stage_guard_sql(stage: Stage) -> String {
    stage
        .preceding()
        .iter()
        .map(|prior| format!("{}_status = 'approved'", prior.as_str()))
        .chain(std::iter::once(format!("{}_status = 'pending'", stage.as_str())))
        .collect::<Vec<_>>()
        .join(" AND ")
}

pub struct SqlChallanStore {
    pool: DbPool,
}

impl SqlChallanStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert_row(&self, challan: NewChallan) -> Result<ChallanId, RepositoryError> {
        if challan.quantity <= 0 {
            return Err(RepositoryError::InvalidQuantity(challan.quantity));
        }

        let result = sqlx::query(
            "INSERT INTO challans (device_type, device_model, serial_number, quantity, purpose,
                                   requested_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&challan.device_type)
        .bind(&challan.device_model)
        .bind(&challan.serial_number)
        .bind(challan.quantity)
        .bind(&challan.purpose)
        .bind(&challan.requested_by)
        .bind(timestamp(&challan.created_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(ChallanId(done.last_insert_rowid())),
            Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
                Err(RepositoryError::DuplicateSerialNumber(challan.serial_number))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn list_rows(&self, filter: &ChallanFilter) -> Result<Vec<Challan>, RepositoryError> {
        let mut conditions = Vec::new();
        if filter.requested_by.is_some() {
            conditions.push("requested_by = ?".to_string());
        }
        if let Some(stage) = filter.pending_for {
            conditions.push(stage_guard_sql(stage));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT {CHALLAN_COLUMNS} FROM challans {where_clause} ORDER BY created_at DESC, id DESC"
        );

        let mut query = sqlx::query(&sql);
        if let Some(requested_by) = &filter.requested_by {
            query = query.bind(requested_by);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_challan).collect()
    }

    /// Conditional write inside one transaction. The first statement is the
    /// guarded UPDATE, so the write lock is taken before anything is read.
    async fn apply_stage_update(
        &self,
        update: StageUpdate,
    ) -> Result<StageUpdateOutcome, RepositoryError> {
        let column = update.stage.as_str();
        let sql = format!(
            "UPDATE challans
             SET {column}_status = ?, {column}_decided_at = ?, remarks = COALESCE(?, remarks)
             WHERE id = ? AND {guard}",
            guard = stage_guard_sql(update.stage)
        );

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(&sql)
            .bind(update.decision.as_status().as_str())
            .bind(timestamp(&update.decided_at))
            .bind(update.remarks.as_deref())
            .bind(update.challan_id.0)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            let current = fetch_challan(&mut *tx, update.challan_id).await?;
            tx.rollback().await?;
            debug!(
                event_name = "db.challan.stage_update_skipped",
                challan_id = %update.challan_id,
                stage = %update.stage,
                found = current.is_some(),
                "guarded stage update matched no row"
            );
            return Ok(match current {
                Some(challan) => StageUpdateOutcome::GuardRejected(challan),
                None => StageUpdateOutcome::NotFound,
            });
        }

        sqlx::query(RECOMPUTE_FINAL_STATUS).bind(update.challan_id.0).execute(&mut *tx).await?;

        let updated = fetch_challan(&mut *tx, update.challan_id).await?.ok_or_else(|| {
            RepositoryError::Decode(format!("challan {} vanished mid-update", update.challan_id))
        })?;
        tx.commit().await?;

        Ok(StageUpdateOutcome::Applied(updated))
    }

    async fn find_identity(&self, username: &str) -> Result<Option<Identity>, RepositoryError> {
        let row = sqlx::query(
            "SELECT username, full_name, role, department FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_identity).transpose()
    }

    async fn catalog_rows(&self) -> Result<Vec<DeviceCatalogEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT device_type, device_model, category FROM devices
             ORDER BY device_type, device_model",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(DeviceCatalogEntry {
                    device_type: column(row, "device_type")?,
                    device_model: column(row, "device_model")?,
                    category: column(row, "category")?,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ChallanStore for SqlChallanStore {
    async fn insert(&self, challan: NewChallan) -> Result<ChallanId, StoreError> {
        Ok(self.insert_row(challan).await?)
    }

    async fn get(&self, id: ChallanId) -> Result<Option<Challan>, StoreError> {
        Ok(fetch_challan(&self.pool, id).await?)
    }

    async fn list(&self, filter: &ChallanFilter) -> Result<Vec<Challan>, StoreError> {
        Ok(self.list_rows(filter).await?)
    }

    async fn update_stage(&self, update: StageUpdate) -> Result<StageUpdateOutcome, StoreError> {
        Ok(self.apply_stage_update(update).await?)
    }

    async fn lookup_identity(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.find_identity(username).await?)
    }

    async fn list_device_catalog(&self) -> Result<Vec<DeviceCatalogEntry>, StoreError> {
        Ok(self.catalog_rows().await?)
    }
}

async fn fetch_challan<'e, E>(executor: E, id: ChallanId) -> Result<Option<Challan>, RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let sql = format!("SELECT {CHALLAN_COLUMNS} FROM challans WHERE id = ?");
    let row = sqlx::query(&sql).bind(id.0).fetch_optional(executor).await?;
    row.as_ref().map(row_to_challan).transpose()
}

/// Fixed-width UTC text so that lexical order is chronological order.
fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{value}`: {error}")))
}

fn column<T>(row: &SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(|error| RepositoryError::Decode(error.to_string()))
}

fn stage_record(row: &SqliteRow, stage: Stage) -> Result<StageRecord, RepositoryError> {
    let status: String = column(row, &format!("{}_status", stage.as_str()))?;
    let decided_at: Option<String> = column(row, &format!("{}_decided_at", stage.as_str()))?;

    Ok(StageRecord {
        status: status
            .parse::<StageStatus>()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?,
        decided_at: decided_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn row_to_challan(row: &SqliteRow) -> Result<Challan, RepositoryError> {
    let created_at: String = column(row, "created_at")?;
    let final_status: String = column(row, "final_status")?;

    Ok(Challan {
        id: ChallanId(column(row, "id")?),
        device_type: column(row, "device_type")?,
        device_model: column(row, "device_model")?,
        serial_number: column(row, "serial_number")?,
        quantity: column(row, "quantity")?,
        purpose: column(row, "purpose")?,
        requested_by: column(row, "requested_by")?,
        created_at: parse_timestamp(&created_at)?,
        manager: stage_record(row, Stage::Manager)?,
        hod: stage_record(row, Stage::Hod)?,
        it_admin: stage_record(row, Stage::ItAdmin)?,
        final_status: final_status
            .parse::<StageStatus>()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?,
        remarks: column(row, "remarks")?,
    })
}

fn row_to_identity(row: &SqliteRow) -> Result<Identity, RepositoryError> {
    let role: String = column(row, "role")?;

    Ok(Identity {
        username: column(row, "username")?,
        full_name: column(row, "full_name")?,
        role: role.parse::<Role>().map_err(|error| RepositoryError::Decode(error.to_string()))?,
        department: column(row, "department")?,
    })
}
