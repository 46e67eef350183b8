use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

pub const MANAGED_TABLES: &[&str] = &[
    "teacher",
    "subject",
    "time_slot",
    "lecture",
    "leave_request",
    "leave_document",
    "replacement_offer",
];

/// Names of managed tables absent from the connected database. Empty means
/// the schema is ready.
pub async fn missing_tables(pool: &DbPool) -> Result<Vec<&'static str>, sqlx::Error> {
    let mut missing = Vec::new();
    for table in MANAGED_TABLES {
        let present: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(table)
        .fetch_one(pool)
        .await?;
        if present == 0 {
            missing.push(*table);
        }
    }
    Ok(missing)
}
