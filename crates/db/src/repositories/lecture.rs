use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use classcover_core::domain::lecture::{Lecture, LectureId, SubjectId, TimeSlotId, WeekDay};
use classcover_core::domain::teacher::UserId;

use super::{LectureRepository, RepositoryError};
use crate::DbPool;

pub struct SqlLectureRepository {
    pool: DbPool,
}

impl SqlLectureRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// `id_column` names the lecture id in the row, since join queries alias it.
pub(crate) fn lecture_from_row(row: &SqliteRow, id_column: &str) -> Result<Lecture, RepositoryError> {
    let week_day: i64 = row.try_get("week_day")?;
    let week_day = WeekDay::new(week_day as u8)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;
    let date: String = row.try_get("date")?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|error| RepositoryError::Decode(format!("invalid lecture date `{date}`: {error}")))?;

    Ok(Lecture {
        id: LectureId(row.try_get(id_column)?),
        teacher_id: UserId(row.try_get("teacher_id")?),
        subject_id: SubjectId(row.try_get("subject_id")?),
        time_slot_id: TimeSlotId(row.try_get("time_slot_id")?),
        week_day,
        date,
        room: row.try_get("room")?,
    })
}

#[async_trait]
impl LectureRepository for SqlLectureRepository {
    async fn find_by_id(&self, id: &LectureId) -> Result<Option<Lecture>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, teacher_id, subject_id, time_slot_id, week_day, date, room
             FROM lecture WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(Some(lecture_from_row(row, "id")?)),
            None => Ok(None),
        }
    }

    async fn list_for_teacher_on_day(
        &self,
        teacher_id: &UserId,
        week_day: WeekDay,
    ) -> Result<Vec<Lecture>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, teacher_id, subject_id, time_slot_id, week_day, date, room
             FROM lecture WHERE teacher_id = ? AND week_day = ? ORDER BY id ASC",
        )
        .bind(&teacher_id.0)
        .bind(week_day.index())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| lecture_from_row(row, "id")).collect()
    }

    async fn insert(&self, lecture: &Lecture) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO lecture (id, teacher_id, subject_id, time_slot_id, week_day, date, room)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&lecture.id.0)
        .bind(&lecture.teacher_id.0)
        .bind(&lecture.subject_id.0)
        .bind(&lecture.time_slot_id.0)
        .bind(lecture.week_day.index())
        .bind(lecture.date.format("%Y-%m-%d").to_string())
        .bind(&lecture.room)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use classcover_core::config::DatabaseConfig;
    use classcover_core::domain::lecture::{Lecture, LectureId, SubjectId, TimeSlotId, WeekDay};
    use classcover_core::domain::teacher::UserId;

    use super::SqlLectureRepository;
    use crate::repositories::LectureRepository;
    use crate::{connect, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect(&DatabaseConfig::ephemeral()).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        sqlx::query("INSERT INTO teacher (id, name, email) VALUES ('t-1', 'A', 'a@x')")
            .execute(&pool)
            .await
            .expect("teacher row");
        sqlx::query("INSERT INTO subject (id, name, code) VALUES ('s-1', 'Math', 'SUB1')")
            .execute(&pool)
            .await
            .expect("subject row");
        sqlx::query(
            "INSERT INTO time_slot (id, start_time, end_time, label)
             VALUES ('ts-1', '10:00', '11:00', 'Period 3')",
        )
        .execute(&pool)
        .await
        .expect("slot row");

        pool
    }

    fn lecture(id: &str, day: u8) -> Lecture {
        Lecture {
            id: LectureId(id.to_string()),
            teacher_id: UserId("t-1".to_string()),
            subject_id: SubjectId("s-1".to_string()),
            time_slot_id: TimeSlotId("ts-1".to_string()),
            week_day: WeekDay::new(day).expect("week day"),
            date: NaiveDate::from_ymd_opt(2025, 1, 6).expect("date"),
            room: "R1".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_then_find_round_trips_week_day_and_date() {
        let pool = setup().await;
        let repo = SqlLectureRepository::new(pool.clone());

        repo.insert(&lecture("lec-1", 1)).await.expect("insert");

        let found = repo
            .find_by_id(&LectureId("lec-1".to_string()))
            .await
            .expect("find")
            .expect("row present");
        assert_eq!(found.week_day.index(), 1);
        assert_eq!(found.date, NaiveDate::from_ymd_opt(2025, 1, 6).expect("date"));
    }

    #[tokio::test]
    async fn day_listing_filters_by_week_day() {
        let pool = setup().await;
        let repo = SqlLectureRepository::new(pool.clone());

        repo.insert(&lecture("lec-mon", 1)).await.expect("insert");
        repo.insert(&lecture("lec-tue", 2)).await.expect("insert");

        let monday = repo
            .list_for_teacher_on_day(&UserId("t-1".to_string()), WeekDay::new(1).expect("day"))
            .await
            .expect("list");
        assert_eq!(monday.len(), 1);
        assert_eq!(monday[0].id.0, "lec-mon");
    }
}
