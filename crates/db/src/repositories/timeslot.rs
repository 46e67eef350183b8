use async_trait::async_trait;
use chrono::NaiveTime;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use classcover_core::domain::lecture::{SlotWindow, TimeSlot, TimeSlotId};

use super::{RepositoryError, TimeSlotRepository};
use crate::DbPool;

pub struct SqlTimeSlotRepository {
    pool: DbPool,
}

impl SqlTimeSlotRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const WALL_FORMAT: &str = "%H:%M";

pub(crate) fn format_wall(time: NaiveTime) -> String {
    time.format(WALL_FORMAT).to_string()
}

pub(crate) fn parse_wall(s: &str) -> Result<NaiveTime, RepositoryError> {
    NaiveTime::parse_from_str(s, WALL_FORMAT)
        .map_err(|error| RepositoryError::Decode(format!("invalid wall clock `{s}`: {error}")))
}

fn time_slot_from_row(row: &SqliteRow) -> Result<TimeSlot, RepositoryError> {
    let start: String = row.try_get("start_time")?;
    let end: String = row.try_get("end_time")?;

    Ok(TimeSlot {
        id: TimeSlotId(row.try_get("id")?),
        start_time: parse_wall(&start)?,
        end_time: parse_wall(&end)?,
        label: row.try_get("label")?,
    })
}

#[async_trait]
impl TimeSlotRepository for SqlTimeSlotRepository {
    async fn find_by_id(&self, id: &TimeSlotId) -> Result<Option<TimeSlot>, RepositoryError> {
        let row =
            sqlx::query("SELECT id, start_time, end_time, label FROM time_slot WHERE id = ?")
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(ref row) => Ok(Some(time_slot_from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn find_by_window(
        &self,
        window: &SlotWindow,
    ) -> Result<Option<TimeSlot>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, start_time, end_time, label FROM time_slot
             WHERE start_time = ? AND end_time = ?",
        )
        .bind(format_wall(window.start))
        .bind(format_wall(window.end))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(Some(time_slot_from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<TimeSlot>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, start_time, end_time, label FROM time_slot ORDER BY start_time ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(time_slot_from_row).collect()
    }

    async fn insert(&self, slot: &TimeSlot) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO time_slot (id, start_time, end_time, label) VALUES (?, ?, ?, ?)",
        )
        .bind(&slot.id.0)
        .bind(format_wall(slot.start_time))
        .bind(format_wall(slot.end_time))
        .bind(&slot.label)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
