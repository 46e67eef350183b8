use sqlx::Executor;

use crate::repositories::RepositoryError;
use crate::DbPool;

/// Deterministic demo timetable: six teachers across three schedule bands,
/// one HOD, one admin, the eight-row day template, and a Monday + Tuesday
/// lecture grid.
pub struct TimetableSeedDataset;

#[derive(Debug)]
pub struct SeedResult {
    pub teachers: i64,
    pub time_slots: i64,
    pub lectures: i64,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

const EXPECTED_TEACHERS: i64 = 8;
const EXPECTED_TIME_SLOTS: i64 = 8;
const EXPECTED_LECTURES: i64 = 36;

impl TimetableSeedDataset {
    /// SQL fixture content for the demo timetable.
    pub const SQL: &str = include_str!("../../../config/fixtures/seed_timetable.sql");

    /// Load the timetable fixture into the database in one transaction.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            teachers: count(pool, "teacher").await?,
            time_slots: count(pool, "time_slot").await?,
            lectures: count(pool, "lecture").await?,
        })
    }

    /// Verify that the seeded rows match the fixture contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        checks.push(("teacher-count", count(pool, "teacher").await? == EXPECTED_TEACHERS));
        checks.push(("time-slot-count", count(pool, "time_slot").await? == EXPECTED_TIME_SLOTS));
        checks.push(("lecture-count", count(pool, "lecture").await? == EXPECTED_LECTURES));

        let hod_present: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM teacher WHERE id = 'hod-1' AND role = 'hod')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("hod-present", hod_present == 1));

        let admin_present: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM teacher WHERE id = 'admin-1' AND role = 'admin')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("admin-present", admin_present == 1));

        // Fixture grid must not double-book anyone.
        let double_booked: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM (
                 SELECT teacher_id FROM lecture
                 GROUP BY teacher_id, week_day, time_slot_id
                 HAVING COUNT(*) > 1
             )",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("no-double-booking", double_booked == 0));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }
}

async fn count(pool: &DbPool, table: &str) -> Result<i64, RepositoryError> {
    let count: i64 =
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}")).fetch_one(pool).await?;
    Ok(count)
}
