use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Usernames and roles the reference seed guarantees.
const SEED_IDENTITIES: &[(&str, &str)] = &[
    ("john_manager", "manager"),
    ("sara_director", "manager"),
    ("mike_hod", "hod"),
    ("lisa_hod", "hod"),
    ("tech_admin", "it_admin"),
    ("inventory_mgr", "it_admin"),
    ("alice_sales", "requester"),
    ("bob_marketing", "requester"),
    ("charlie_ops", "requester"),
    ("diana_hr", "requester"),
];

const SEED_DEVICE_COUNTS: &[(&str, i64)] = &[("phone", 8), ("tablet", 6)];

/// Deterministic identities and device catalog for demos and manual testing.
/// Loading twice leaves the tables unchanged.
pub struct ReferenceSeed;

impl ReferenceSeed {
    pub const SQL: &str = include_str!("../../../config/fixtures/reference_seed.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let identities: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM users").fetch_one(pool).await?;
        let devices: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM devices").fetch_one(pool).await?;

        Ok(SeedResult { identities, devices })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for (username, role) in SEED_IDENTITIES {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 AND role = ?2)",
            )
            .bind(username)
            .bind(role)
            .fetch_one(pool)
            .await?;
            checks.push((*username, present == 1));
        }

        for (device_type, expected) in SEED_DEVICE_COUNTS {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM devices WHERE device_type = ?1")
                    .bind(device_type)
                    .fetch_one(pool)
                    .await?;
            checks.push((*device_type, count >= *expected));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub identities: i64,
    pub devices: i64,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
