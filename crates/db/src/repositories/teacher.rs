use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use classcover_core::domain::lecture::{Lecture, TimeSlotId, WeekDay};
use classcover_core::domain::teacher::{Role, Teacher, TeacherStatus, UserId};

use super::lecture::lecture_from_row;
use super::{RepositoryError, TeacherRepository};
use crate::DbPool;

pub struct SqlTeacherRepository {
    pool: DbPool,
}

impl SqlTeacherRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub fn role_as_str(role: &Role) -> &'static str {
    match role {
        Role::Teacher => "teacher",
        Role::Hod => "hod",
        Role::Admin => "admin",
    }
}

fn parse_role(s: &str) -> Result<Role, RepositoryError> {
    match s {
        "teacher" => Ok(Role::Teacher),
        "hod" => Ok(Role::Hod),
        "admin" => Ok(Role::Admin),
        other => Err(RepositoryError::Decode(format!("unknown role `{other}`"))),
    }
}

pub fn teacher_status_as_str(status: &TeacherStatus) -> &'static str {
    match status {
        TeacherStatus::Active => "active",
        TeacherStatus::Inactive => "inactive",
    }
}

fn parse_teacher_status(s: &str) -> Result<TeacherStatus, RepositoryError> {
    match s {
        "active" => Ok(TeacherStatus::Active),
        "inactive" => Ok(TeacherStatus::Inactive),
        other => Err(RepositoryError::Decode(format!("unknown teacher status `{other}`"))),
    }
}

fn teacher_from_row(row: &SqliteRow) -> Result<Teacher, RepositoryError> {
    let role: String = row.try_get("role")?;
    let status: String = row.try_get("status")?;

    Ok(Teacher {
        id: UserId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: parse_role(&role)?,
        status: parse_teacher_status(&status)?,
    })
}

#[async_trait]
impl TeacherRepository for SqlTeacherRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<Teacher>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, email, role, status FROM teacher WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref row) => Ok(Some(teacher_from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn list_swap_candidates(
        &self,
        week_day: WeekDay,
        replace_slot_id: &TimeSlotId,
        original_slot_id: &TimeSlotId,
        exclude: &UserId,
    ) -> Result<Vec<(Teacher, Lecture)>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT
                t.id, t.name, t.email, t.role, t.status,
                l.id AS lecture_id, l.teacher_id, l.subject_id, l.time_slot_id,
                l.week_day, l.date, l.room
            FROM teacher t
            JOIN lecture l
              ON l.teacher_id = t.id
             AND l.week_day = ?1
             AND l.time_slot_id = ?2
            WHERE t.role = 'teacher'
              AND t.status = 'active'
              AND t.id <> ?4
              AND NOT EXISTS (
                  SELECT 1 FROM lecture busy
                  WHERE busy.teacher_id = t.id
                    AND busy.week_day = ?1
                    AND busy.time_slot_id = ?3
              )
            ORDER BY t.id ASC
            "#,
        )
        .bind(week_day.index())
        .bind(&replace_slot_id.0)
        .bind(&original_slot_id.0)
        .bind(&exclude.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let teacher = teacher_from_row(row)?;
                let lecture = lecture_from_row(row, "lecture_id")?;
                Ok((teacher, lecture))
            })
            .collect()
    }

    async fn insert(&self, teacher: &Teacher) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO teacher (id, name, email, role, status) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&teacher.id.0)
        .bind(&teacher.name)
        .bind(&teacher.email)
        .bind(role_as_str(&teacher.role))
        .bind(teacher_status_as_str(&teacher.status))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use classcover_core::config::DatabaseConfig;
    use classcover_core::domain::teacher::{Role, Teacher, TeacherStatus, UserId};

    use super::SqlTeacherRepository;
    use crate::repositories::TeacherRepository;
    use crate::{connect, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect(&DatabaseConfig::ephemeral()).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn teacher(id: &str, role: Role) -> Teacher {
        Teacher {
            id: UserId(id.to_string()),
            name: format!("Teacher {id}"),
            email: format!("{id}@example.com"),
            role,
            status: TeacherStatus::Active,
        }
    }

    #[tokio::test]
    async fn insert_then_find_round_trips_role_and_status() {
        let pool = setup().await;
        let repo = SqlTeacherRepository::new(pool.clone());

        repo.insert(&teacher("hod-1", Role::Hod)).await.expect("insert");

        let found = repo
            .find_by_id(&UserId("hod-1".to_string()))
            .await
            .expect("find")
            .expect("row present");
        assert_eq!(found.role, Role::Hod);
        assert_eq!(found.status, TeacherStatus::Active);
    }

    #[tokio::test]
    async fn find_by_id_returns_none_for_unknown_teacher() {
        let pool = setup().await;
        let repo = SqlTeacherRepository::new(pool.clone());

        let found = repo.find_by_id(&UserId("missing".to_string())).await.expect("find");
        assert!(found.is_none());
    }
}
