use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use classcover_core::domain::leave::{LeaveDocument, LeaveRequest, LeaveRequestId, LeaveStatus};
use classcover_core::domain::lecture::LectureId;
use classcover_core::domain::offer::{OfferStatus, ReplacementOffer};
use classcover_core::domain::teacher::UserId;

use super::offer::{offer_from_row, offer_status_as_str};
use super::{DenyOutcome, FinalizeOutcome, ForwardOutcome, LeaveRepository, RepositoryError};
use crate::DbPool;

pub struct SqlLeaveRepository {
    pool: DbPool,
}

impl SqlLeaveRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn leave_status_as_str(status: &LeaveStatus) -> &'static str {
    match status {
        LeaveStatus::Pending => "pending",
        LeaveStatus::Approved => "approved",
        LeaveStatus::Denied => "denied",
    }
}

fn parse_leave_status(s: &str) -> Result<LeaveStatus, RepositoryError> {
    match s {
        "pending" => Ok(LeaveStatus::Pending),
        "approved" => Ok(LeaveStatus::Approved),
        "denied" => Ok(LeaveStatus::Denied),
        other => Err(RepositoryError::Decode(format!("unknown leave status `{other}`"))),
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{s}`: {error}")))
}

fn leave_from_row(row: &SqliteRow) -> Result<LeaveRequest, RepositoryError> {
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(LeaveRequest {
        id: LeaveRequestId(row.try_get("id")?),
        requester_id: UserId(row.try_get("requester_id")?),
        lecture_id: LectureId(row.try_get("lecture_id")?),
        reason: row.try_get("reason")?,
        status: parse_leave_status(&status)?,
        approver_id: row.try_get::<Option<String>, _>("approver_id")?.map(UserId),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

const LEAVE_COLUMNS: &str =
    "id, requester_id, lecture_id, reason, status, approver_id, created_at, updated_at";

#[async_trait]
impl LeaveRepository for SqlLeaveRepository {
    async fn insert(
        &self,
        request: &LeaveRequest,
        document: Option<&LeaveDocument>,
        offers: &[ReplacementOffer],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO leave_request
                 (id, requester_id, lecture_id, reason, status, approver_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(&request.requester_id.0)
        .bind(&request.lecture_id.0)
        .bind(&request.reason)
        .bind(leave_status_as_str(&request.status))
        .bind(request.approver_id.as_ref().map(|id| id.0.as_str()))
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        if let Some(document) = document {
            sqlx::query(
                "INSERT INTO leave_document
                     (id, leave_request_id, applicant_id, object_key, created_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&document.id)
            .bind(&document.leave_request_id.0)
            .bind(&document.applicant_id.0)
            .bind(&document.object_key)
            .bind(document.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        for offer in offers {
            sqlx::query(
                "INSERT INTO replacement_offer
                     (id, lecture_id, offerer_id, accepter_id, replace_lecture_id,
                      leave_id, approver_id, status, message, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&offer.id.0)
            .bind(&offer.lecture_id.0)
            .bind(&offer.offerer_id.0)
            .bind(&offer.accepter_id.0)
            .bind(offer.replace_lecture_id.as_ref().map(|id| id.0.as_str()))
            .bind(offer.leave_id.as_ref().map(|id| id.0.as_str()))
            .bind(offer.approver_id.as_ref().map(|id| id.0.as_str()))
            .bind(offer_status_as_str(&offer.status))
            .bind(&offer.message)
            .bind(offer.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &LeaveRequestId,
    ) -> Result<Option<LeaveRequest>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {LEAVE_COLUMNS} FROM leave_request WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref row) => Ok(Some(leave_from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn find_live_for(
        &self,
        requester_id: &UserId,
        lecture_id: &LectureId,
    ) -> Result<Option<LeaveRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_request
             WHERE requester_id = ? AND lecture_id = ? AND status = 'pending'
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(&requester_id.0)
        .bind(&lecture_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(Some(leave_from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn find_document(
        &self,
        request_id: &LeaveRequestId,
    ) -> Result<Option<LeaveDocument>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, leave_request_id, applicant_id, object_key, created_at
             FROM leave_document WHERE leave_request_id = ?",
        )
        .bind(&request_id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let created_at: String = row.try_get("created_at")?;
        Ok(Some(LeaveDocument {
            id: row.try_get("id")?,
            leave_request_id: LeaveRequestId(row.try_get("leave_request_id")?),
            applicant_id: UserId(row.try_get("applicant_id")?),
            object_key: row.try_get("object_key")?,
            created_at: parse_timestamp(&created_at)?,
        }))
    }

    async fn forward_to_admin(
        &self,
        request_id: &LeaveRequestId,
        hod_id: &UserId,
    ) -> Result<ForwardOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // The coverage rule is part of the guard: forwarding succeeds only
        // while an accepted offer exists for the lecture.
        let forwarded = sqlx::query(
            "UPDATE leave_request SET approver_id = ?1, updated_at = ?2
             WHERE id = ?3 AND status = 'pending' AND approver_id IS NULL
               AND EXISTS (
                   SELECT 1 FROM replacement_offer ro
                   WHERE ro.lecture_id = leave_request.lecture_id
                     AND ro.status = 'accepted'
               )",
        )
        .bind(&hod_id.0)
        .bind(Utc::now().to_rfc3339())
        .bind(&request_id.0)
        .execute(&mut *tx)
        .await?;

        if forwarded.rows_affected() == 1 {
            let row = sqlx::query(&format!(
                "SELECT {LEAVE_COLUMNS} FROM leave_request WHERE id = ?"
            ))
            .bind(&request_id.0)
            .fetch_one(&mut *tx)
            .await?;
            let request = leave_from_row(&row)?;
            tx.commit().await?;
            return Ok(ForwardOutcome::Forwarded(request));
        }

        // Nothing changed; diagnose which precondition failed.
        let row = sqlx::query(&format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_request WHERE id = ?"
        ))
        .bind(&request_id.0)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match row {
            None => ForwardOutcome::NotFound,
            Some(ref row) => {
                let request = leave_from_row(row)?;
                if request.status != LeaveStatus::Pending || request.approver_id.is_some() {
                    ForwardOutcome::NotPendingHod {
                        status: request.status,
                        already_forwarded: request.approver_id.is_some(),
                    }
                } else {
                    ForwardOutcome::NoCoverage
                }
            }
        };
        Ok(outcome)
    }

    async fn finalize_approval(
        &self,
        request_id: &LeaveRequestId,
        admin_id: &UserId,
    ) -> Result<FinalizeOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_request WHERE id = ?"
        ))
        .bind(&request_id.0)
        .fetch_optional(&mut *tx)
        .await?;
        let mut request = match row {
            Some(ref row) => leave_from_row(row)?,
            None => return Ok(FinalizeOutcome::NotFound),
        };
        if request.status != LeaveStatus::Pending {
            return Ok(FinalizeOutcome::NotPending { status: request.status });
        }

        let offer_row = sqlx::query(
            "SELECT id, lecture_id, offerer_id, accepter_id, replace_lecture_id,
                    leave_id, approver_id, status, message, created_at
             FROM replacement_offer WHERE lecture_id = ? AND status = 'accepted'",
        )
        .bind(&request.lecture_id.0)
        .fetch_optional(&mut *tx)
        .await?;
        let mut offer = match offer_row {
            Some(ref row) => offer_from_row(row)?,
            None => return Ok(FinalizeOutcome::NoCoverage),
        };

        let (covered_slot, covered_day): (String, i64) = sqlx::query_as(
            "SELECT time_slot_id, week_day FROM lecture WHERE id = ?",
        )
        .bind(&request.lecture_id.0)
        .fetch_one(&mut *tx)
        .await?;

        // The accepter must still be free in the covered slot. State may
        // have drifted since the offer was accepted.
        let accepter_busy: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lecture
             WHERE teacher_id = ? AND week_day = ? AND time_slot_id = ? AND id <> ?",
        )
        .bind(&offer.accepter_id.0)
        .bind(covered_day)
        .bind(&covered_slot)
        .bind(&request.lecture_id.0)
        .fetch_one(&mut *tx)
        .await?;
        if accepter_busy > 0 {
            return Ok(FinalizeOutcome::Conflict {
                teacher_id: offer.accepter_id.clone(),
                lecture_id: request.lecture_id.clone(),
            });
        }

        // For a true swap, the offerer takes over the accepter's vacated
        // lecture and must be free in that slot too.
        if let Some(replace_lecture_id) = &offer.replace_lecture_id {
            let (swap_slot, swap_day): (String, i64) = sqlx::query_as(
                "SELECT time_slot_id, week_day FROM lecture WHERE id = ?",
            )
            .bind(&replace_lecture_id.0)
            .fetch_one(&mut *tx)
            .await?;

            let offerer_busy: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM lecture
                 WHERE teacher_id = ? AND week_day = ? AND time_slot_id = ?
                   AND id NOT IN (?, ?)",
            )
            .bind(&offer.offerer_id.0)
            .bind(swap_day)
            .bind(&swap_slot)
            .bind(&request.lecture_id.0)
            .bind(&replace_lecture_id.0)
            .fetch_one(&mut *tx)
            .await?;
            if offerer_busy > 0 {
                return Ok(FinalizeOutcome::Conflict {
                    teacher_id: offer.offerer_id.clone(),
                    lecture_id: replace_lecture_id.clone(),
                });
            }
        }

        let now = Utc::now();
        let decided = sqlx::query(
            "UPDATE leave_request SET status = 'approved', approver_id = ?, updated_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(&admin_id.0)
        .bind(now.to_rfc3339())
        .bind(&request_id.0)
        .execute(&mut *tx)
        .await?;
        if decided.rows_affected() == 0 {
            return Ok(FinalizeOutcome::NotPending { status: request.status });
        }

        sqlx::query("UPDATE lecture SET teacher_id = ? WHERE id = ?")
            .bind(&offer.accepter_id.0)
            .bind(&request.lecture_id.0)
            .execute(&mut *tx)
            .await?;

        if let Some(replace_lecture_id) = &offer.replace_lecture_id {
            sqlx::query("UPDATE lecture SET teacher_id = ? WHERE id = ?")
                .bind(&offer.offerer_id.0)
                .bind(&replace_lecture_id.0)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("UPDATE replacement_offer SET approver_id = ? WHERE id = ?")
            .bind(&admin_id.0)
            .bind(&offer.id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        request
            .transition_to(LeaveStatus::Approved)
            .map_err(|error| RepositoryError::State(error.to_string()))?;
        request.approver_id = Some(admin_id.clone());
        request.updated_at = now;
        offer.approver_id = Some(admin_id.clone());

        Ok(FinalizeOutcome::Approved { request, offer })
    }

    async fn deny(
        &self,
        request_id: &LeaveRequestId,
        approver_id: &UserId,
        message: &str,
    ) -> Result<DenyOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_request WHERE id = ?"
        ))
        .bind(&request_id.0)
        .fetch_optional(&mut *tx)
        .await?;
        let mut request = match row {
            Some(ref row) => leave_from_row(row)?,
            None => return Ok(DenyOutcome::NotFound),
        };
        if request.status != LeaveStatus::Pending {
            return Ok(DenyOutcome::NotPending { status: request.status });
        }

        let now = Utc::now();
        let decided = sqlx::query(
            "UPDATE leave_request SET status = 'denied', approver_id = ?, updated_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(&approver_id.0)
        .bind(now.to_rfc3339())
        .bind(&request_id.0)
        .execute(&mut *tx)
        .await?;
        if decided.rows_affected() == 0 {
            return Ok(DenyOutcome::NotPending { status: request.status });
        }

        // A denial voids any acceptance, so the cascade covers accepted
        // offers as well as pending ones.
        let offer_rows = sqlx::query(
            "SELECT id, lecture_id, offerer_id, accepter_id, replace_lecture_id,
                    leave_id, approver_id, status, message, created_at
             FROM replacement_offer WHERE lecture_id = ? AND status <> 'declined'",
        )
        .bind(&request.lecture_id.0)
        .fetch_all(&mut *tx)
        .await?;
        let mut declined_offers =
            offer_rows.iter().map(offer_from_row).collect::<Result<Vec<_>, _>>()?;

        sqlx::query(
            "UPDATE replacement_offer SET status = 'declined', message = ?
             WHERE lecture_id = ? AND status <> 'declined'",
        )
        .bind(message)
        .bind(&request.lecture_id.0)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        request
            .transition_to(LeaveStatus::Denied)
            .map_err(|error| RepositoryError::State(error.to_string()))?;
        request.approver_id = Some(approver_id.clone());
        request.updated_at = now;
        for offer in &mut declined_offers {
            // The cascade may void an acceptance; the status machine
            // allows exactly that flip.
            offer
                .transition_to(OfferStatus::Declined)
                .map_err(|error| RepositoryError::State(error.to_string()))?;
            offer.message = Some(message.to_string());
        }

        Ok(DenyOutcome::Denied { request, declined_offers })
    }

    async fn list_pending_hod(&self) -> Result<Vec<LeaveRequest>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_request
             WHERE status = 'pending' AND approver_id IS NULL
             ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(leave_from_row).collect()
    }

    async fn list_pending_admin(&self) -> Result<Vec<LeaveRequest>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_request
             WHERE status = 'pending' AND approver_id IS NOT NULL
             ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(leave_from_row).collect()
    }

    async fn list_for_requester(
        &self,
        requester_id: &UserId,
    ) -> Result<Vec<LeaveRequest>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_request
             WHERE requester_id = ? ORDER BY created_at DESC, id ASC"
        ))
        .bind(&requester_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(leave_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use classcover_core::config::DatabaseConfig;
    use classcover_core::domain::leave::{LeaveDocument, LeaveRequest, LeaveRequestId, LeaveStatus};
    use classcover_core::domain::lecture::LectureId;
    use classcover_core::domain::offer::{OfferId, OfferStatus, ReplacementOffer};
    use classcover_core::domain::teacher::UserId;

    use super::SqlLeaveRepository;
    use crate::repositories::{
        DenyOutcome, FinalizeOutcome, ForwardOutcome, LeaveRepository, OfferRepository,
        SqlOfferRepository,
    };
    use crate::{connect, migrations};

    /// Timetable: t-1 teaches lec-1 (Mon, 10:00), t-2 teaches lec-2
    /// (Mon, 13:00); hod-1 and admin-1 are the approvers.
    async fn setup() -> sqlx::SqlitePool {
        let pool = connect(&DatabaseConfig::ephemeral()).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        for (id, email) in
            [("t-1", "a@x"), ("t-2", "b@x"), ("t-3", "c@x"), ("hod-1", "h@x"), ("admin-1", "ad@x")]
        {
            sqlx::query("INSERT INTO teacher (id, name, email) VALUES (?, ?, ?)")
                .bind(id)
                .bind(id)
                .bind(email)
                .execute(&pool)
                .await
                .expect("teacher row");
        }
        sqlx::query("INSERT INTO subject (id, name, code) VALUES ('s-1', 'Math', 'SUB1')")
            .execute(&pool)
            .await
            .expect("subject row");
        for (id, start, end, label) in
            [("ts-3", "10:00", "11:00", "Period 3"), ("ts-5", "13:00", "14:00", "Period 5")]
        {
            sqlx::query(
                "INSERT INTO time_slot (id, start_time, end_time, label) VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(start)
            .bind(end)
            .bind(label)
            .execute(&pool)
            .await
            .expect("slot row");
        }
        for (id, teacher, slot) in [("lec-1", "t-1", "ts-3"), ("lec-2", "t-2", "ts-5")] {
            sqlx::query(
                "INSERT INTO lecture (id, teacher_id, subject_id, time_slot_id, week_day, date, room)
                 VALUES (?, ?, 's-1', ?, 1, '2025-01-06', 'R1')",
            )
            .bind(id)
            .bind(teacher)
            .bind(slot)
            .execute(&pool)
            .await
            .expect("lecture row");
        }

        pool
    }

    fn request(id: &str) -> LeaveRequest {
        let now = Utc::now();
        LeaveRequest {
            id: LeaveRequestId(id.to_string()),
            requester_id: UserId("t-1".to_string()),
            lecture_id: LectureId("lec-1".to_string()),
            reason: "medical".to_string(),
            status: LeaveStatus::Pending,
            approver_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn swap_offer(id: &str, leave_id: &str) -> ReplacementOffer {
        ReplacementOffer {
            id: OfferId(id.to_string()),
            lecture_id: LectureId("lec-1".to_string()),
            offerer_id: UserId("t-1".to_string()),
            accepter_id: UserId("t-2".to_string()),
            replace_lecture_id: Some(LectureId("lec-2".to_string())),
            leave_id: Some(LeaveRequestId(leave_id.to_string())),
            approver_id: None,
            status: OfferStatus::Pending,
            message: None,
            created_at: Utc::now(),
        }
    }

    async fn lecture_teacher(pool: &sqlx::SqlitePool, lecture: &str) -> String {
        sqlx::query_scalar("SELECT teacher_id FROM lecture WHERE id = ?")
            .bind(lecture)
            .fetch_one(pool)
            .await
            .expect("lecture teacher")
    }

    #[tokio::test]
    async fn insert_stores_request_document_and_fan_out_together() {
        let pool = setup().await;
        let repo = SqlLeaveRepository::new(pool.clone());
        let offers = SqlOfferRepository::new(pool.clone());

        let request = request("lr-1");
        let document = LeaveDocument {
            id: "doc-1".to_string(),
            leave_request_id: request.id.clone(),
            applicant_id: request.requester_id.clone(),
            object_key: "leaves/t-1/lec-1.pdf".to_string(),
            created_at: Utc::now(),
        };
        repo.insert(&request, Some(&document), &[swap_offer("ro-1", "lr-1")])
            .await
            .expect("insert");

        let stored = repo.find_document(&request.id).await.expect("find").expect("document");
        assert_eq!(stored.object_key, "leaves/t-1/lec-1.pdf");

        let fanned_out =
            offers.list_for_lecture(&request.lecture_id).await.expect("offer listing");
        assert_eq!(fanned_out.len(), 1);
        assert_eq!(fanned_out[0].leave_id, Some(request.id.clone()));

        let live = repo
            .find_live_for(&request.requester_id, &request.lecture_id)
            .await
            .expect("probe")
            .expect("live request");
        assert_eq!(live.id, request.id);
    }

    #[tokio::test]
    async fn forward_requires_an_accepted_offer() {
        let pool = setup().await;
        let leaves = SqlLeaveRepository::new(pool.clone());
        let offers = SqlOfferRepository::new(pool.clone());

        leaves.insert(&request("lr-1"), None, &[]).await.expect("insert");

        let refused = leaves
            .forward_to_admin(&LeaveRequestId("lr-1".to_string()), &UserId("hod-1".to_string()))
            .await
            .expect("forward");
        assert_eq!(refused, ForwardOutcome::NoCoverage);

        offers.create_fan_out(&[swap_offer("ro-1", "lr-1")]).await.expect("fan out");
        offers.accept_exclusive(&OfferId("ro-1".to_string())).await.expect("accept");

        let forwarded = leaves
            .forward_to_admin(&LeaveRequestId("lr-1".to_string()), &UserId("hod-1".to_string()))
            .await
            .expect("forward");
        let ForwardOutcome::Forwarded(request) = forwarded else {
            panic!("expected forward, got {forwarded:?}");
        };
        assert_eq!(request.status, LeaveStatus::Pending);
        assert_eq!(request.approver_id, Some(UserId("hod-1".to_string())));
    }

    #[tokio::test]
    async fn forward_twice_reports_already_forwarded() {
        let pool = setup().await;
        let leaves = SqlLeaveRepository::new(pool.clone());
        let offers = SqlOfferRepository::new(pool.clone());

        leaves.insert(&request("lr-1"), None, &[]).await.expect("insert");
        offers.create_fan_out(&[swap_offer("ro-1", "lr-1")]).await.expect("fan out");
        offers.accept_exclusive(&OfferId("ro-1".to_string())).await.expect("accept");

        let id = LeaveRequestId("lr-1".to_string());
        leaves.forward_to_admin(&id, &UserId("hod-1".to_string())).await.expect("first forward");
        let replay =
            leaves.forward_to_admin(&id, &UserId("hod-1".to_string())).await.expect("replay");
        assert_eq!(
            replay,
            ForwardOutcome::NotPendingHod { status: LeaveStatus::Pending, already_forwarded: true }
        );
    }

    #[tokio::test]
    async fn finalize_commits_the_two_way_swap() {
        let pool = setup().await;
        let leaves = SqlLeaveRepository::new(pool.clone());
        let offers = SqlOfferRepository::new(pool.clone());

        leaves.insert(&request("lr-1"), None, &[]).await.expect("insert");
        offers.create_fan_out(&[swap_offer("ro-1", "lr-1")]).await.expect("fan out");
        offers.accept_exclusive(&OfferId("ro-1".to_string())).await.expect("accept");

        let outcome = leaves
            .finalize_approval(&LeaveRequestId("lr-1".to_string()), &UserId("admin-1".to_string()))
            .await
            .expect("finalize");
        let FinalizeOutcome::Approved { request, offer } = outcome else {
            panic!("expected approval, got {outcome:?}");
        };
        assert_eq!(request.status, LeaveStatus::Approved);
        assert_eq!(request.approver_id, Some(UserId("admin-1".to_string())));
        assert_eq!(offer.approver_id, Some(UserId("admin-1".to_string())));

        // lec-1 goes to the accepter, lec-2 back to the offerer.
        assert_eq!(lecture_teacher(&pool, "lec-1").await, "t-2");
        assert_eq!(lecture_teacher(&pool, "lec-2").await, "t-1");
    }

    #[tokio::test]
    async fn finalize_without_coverage_is_refused() {
        let pool = setup().await;
        let leaves = SqlLeaveRepository::new(pool.clone());

        leaves.insert(&request("lr-1"), None, &[]).await.expect("insert");

        let outcome = leaves
            .finalize_approval(&LeaveRequestId("lr-1".to_string()), &UserId("admin-1".to_string()))
            .await
            .expect("finalize");
        assert_eq!(outcome, FinalizeOutcome::NoCoverage);
    }

    #[tokio::test]
    async fn finalize_detects_drifted_schedule_and_leaves_state_untouched() {
        let pool = setup().await;
        let leaves = SqlLeaveRepository::new(pool.clone());
        let offers = SqlOfferRepository::new(pool.clone());

        leaves.insert(&request("lr-1"), None, &[]).await.expect("insert");
        offers.create_fan_out(&[swap_offer("ro-1", "lr-1")]).await.expect("fan out");
        offers.accept_exclusive(&OfferId("ro-1".to_string())).await.expect("accept");

        // Between acceptance and final approval the accepter picks up a new
        // lecture in the covered slot.
        sqlx::query(
            "INSERT INTO lecture (id, teacher_id, subject_id, time_slot_id, week_day, date, room)
             VALUES ('lec-3', 't-2', 's-1', 'ts-3', 1, '2025-01-06', 'R2')",
        )
        .execute(&pool)
        .await
        .expect("drifted lecture");

        let outcome = leaves
            .finalize_approval(&LeaveRequestId("lr-1".to_string()), &UserId("admin-1".to_string()))
            .await
            .expect("finalize");
        assert_eq!(
            outcome,
            FinalizeOutcome::Conflict {
                teacher_id: UserId("t-2".to_string()),
                lecture_id: LectureId("lec-1".to_string()),
            }
        );

        let stored = leaves
            .find_by_id(&LeaveRequestId("lr-1".to_string()))
            .await
            .expect("find")
            .expect("request");
        assert_eq!(stored.status, LeaveStatus::Pending);
        assert_eq!(lecture_teacher(&pool, "lec-1").await, "t-1");
    }

    #[tokio::test]
    async fn deny_cascades_over_accepted_offers_and_stamps_the_message() {
        let pool = setup().await;
        let leaves = SqlLeaveRepository::new(pool.clone());
        let offers = SqlOfferRepository::new(pool.clone());

        leaves.insert(&request("lr-1"), None, &[]).await.expect("insert");
        offers.create_fan_out(&[swap_offer("ro-1", "lr-1")]).await.expect("fan out");
        offers.accept_exclusive(&OfferId("ro-1".to_string())).await.expect("accept");

        let outcome = leaves
            .deny(
                &LeaveRequestId("lr-1".to_string()),
                &UserId("admin-1".to_string()),
                "Leave request was denied. Reason: N/A",
            )
            .await
            .expect("deny");
        let DenyOutcome::Denied { request, declined_offers } = outcome else {
            panic!("expected denial, got {outcome:?}");
        };
        assert_eq!(request.status, LeaveStatus::Denied);
        assert_eq!(declined_offers.len(), 1);
        assert_eq!(declined_offers[0].status, OfferStatus::Declined);

        let stored =
            offers.find_by_id(&OfferId("ro-1".to_string())).await.expect("find").expect("offer");
        assert_eq!(stored.status, OfferStatus::Declined);
        assert_eq!(stored.message.as_deref(), Some("Leave request was denied. Reason: N/A"));

        // No lecture mutation on denial.
        assert_eq!(lecture_teacher(&pool, "lec-1").await, "t-1");

        let replay = leaves
            .deny(&LeaveRequestId("lr-1".to_string()), &UserId("admin-1".to_string()), "again")
            .await
            .expect("replay");
        assert_eq!(replay, DenyOutcome::NotPending { status: LeaveStatus::Denied });
    }

    #[tokio::test]
    async fn tier_listings_route_by_approver_presence() {
        let pool = setup().await;
        let leaves = SqlLeaveRepository::new(pool.clone());
        let offers = SqlOfferRepository::new(pool.clone());

        leaves.insert(&request("lr-1"), None, &[]).await.expect("insert");
        assert_eq!(leaves.list_pending_hod().await.expect("hod queue").len(), 1);
        assert!(leaves.list_pending_admin().await.expect("admin queue").is_empty());

        offers.create_fan_out(&[swap_offer("ro-1", "lr-1")]).await.expect("fan out");
        offers.accept_exclusive(&OfferId("ro-1".to_string())).await.expect("accept");
        leaves
            .forward_to_admin(&LeaveRequestId("lr-1".to_string()), &UserId("hod-1".to_string()))
            .await
            .expect("forward");

        assert!(leaves.list_pending_hod().await.expect("hod queue").is_empty());
        assert_eq!(leaves.list_pending_admin().await.expect("admin queue").len(), 1);
    }
}
