use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use classcover_core::domain::leave::LeaveRequestId;
use classcover_core::domain::lecture::LectureId;
use classcover_core::domain::offer::{OfferId, OfferStatus, ReplacementOffer};
use classcover_core::domain::teacher::UserId;

use super::{AcceptOutcome, DeclineOutcome, OfferRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOfferRepository {
    pool: DbPool,
}

impl SqlOfferRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn offer_status_as_str(status: &OfferStatus) -> &'static str {
    match status {
        OfferStatus::Pending => "pending",
        OfferStatus::Accepted => "accepted",
        OfferStatus::Declined => "declined",
    }
}

pub(crate) fn parse_offer_status(s: &str) -> Result<OfferStatus, RepositoryError> {
    match s {
        "pending" => Ok(OfferStatus::Pending),
        "accepted" => Ok(OfferStatus::Accepted),
        "declined" => Ok(OfferStatus::Declined),
        other => Err(RepositoryError::Decode(format!("unknown offer status `{other}`"))),
    }
}

pub(crate) fn offer_from_row(row: &SqliteRow) -> Result<ReplacementOffer, RepositoryError> {
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            RepositoryError::Decode(format!("invalid offer timestamp `{created_at}`: {error}"))
        })?;

    Ok(ReplacementOffer {
        id: OfferId(row.try_get("id")?),
        lecture_id: LectureId(row.try_get("lecture_id")?),
        offerer_id: UserId(row.try_get("offerer_id")?),
        accepter_id: UserId(row.try_get("accepter_id")?),
        replace_lecture_id: row
            .try_get::<Option<String>, _>("replace_lecture_id")?
            .map(LectureId),
        leave_id: row.try_get::<Option<String>, _>("leave_id")?.map(LeaveRequestId),
        approver_id: row.try_get::<Option<String>, _>("approver_id")?.map(UserId),
        status: parse_offer_status(&status)?,
        message: row.try_get("message")?,
        created_at,
    })
}

const OFFER_COLUMNS: &str = "id, lecture_id, offerer_id, accepter_id, replace_lecture_id, \
                             leave_id, approver_id, status, message, created_at";

#[async_trait]
impl OfferRepository for SqlOfferRepository {
    async fn create_fan_out(&self, offers: &[ReplacementOffer]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

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

    async fn find_by_id(&self, id: &OfferId) -> Result<Option<ReplacementOffer>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {OFFER_COLUMNS} FROM replacement_offer WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(Some(offer_from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn accept_exclusive(&self, id: &OfferId) -> Result<AcceptOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Re-read inside the transaction so a concurrent accept on a
        // sibling is observed before any write.
        let row = sqlx::query(&format!(
            "SELECT {OFFER_COLUMNS} FROM replacement_offer WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&mut *tx)
        .await?;

        let offer = match row {
            Some(ref row) => offer_from_row(row)?,
            None => return Ok(AcceptOutcome::NotFound),
        };
        if offer.status != OfferStatus::Pending {
            return Ok(AcceptOutcome::AlreadyDecided { current: offer.status });
        }

        let flipped = sqlx::query(
            "UPDATE replacement_offer SET status = 'accepted'
             WHERE id = ? AND status = 'pending'",
        )
        .bind(&id.0)
        .execute(&mut *tx)
        .await?;
        if flipped.rows_affected() == 0 {
            return Ok(AcceptOutcome::AlreadyDecided { current: offer.status });
        }

        let sibling_rows = sqlx::query(&format!(
            "SELECT {OFFER_COLUMNS} FROM replacement_offer
             WHERE lecture_id = ? AND id <> ? AND status = 'pending'"
        ))
        .bind(&offer.lecture_id.0)
        .bind(&id.0)
        .fetch_all(&mut *tx)
        .await?;
        let mut declined_siblings =
            sibling_rows.iter().map(offer_from_row).collect::<Result<Vec<_>, _>>()?;

        sqlx::query(
            "UPDATE replacement_offer SET status = 'declined'
             WHERE lecture_id = ? AND id <> ? AND status = 'pending'",
        )
        .bind(&offer.lecture_id.0)
        .bind(&id.0)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut accepted = offer;
        accepted
            .transition_to(OfferStatus::Accepted)
            .map_err(|error| RepositoryError::State(error.to_string()))?;
        for sibling in &mut declined_siblings {
            sibling
                .transition_to(OfferStatus::Declined)
                .map_err(|error| RepositoryError::State(error.to_string()))?;
        }

        Ok(AcceptOutcome::Accepted { offer: accepted, declined_siblings })
    }

    async fn decline(&self, id: &OfferId) -> Result<DeclineOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {OFFER_COLUMNS} FROM replacement_offer WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&mut *tx)
        .await?;

        let offer = match row {
            Some(ref row) => offer_from_row(row)?,
            None => return Ok(DeclineOutcome::NotFound),
        };
        if offer.status != OfferStatus::Pending {
            return Ok(DeclineOutcome::AlreadyDecided { current: offer.status });
        }

        sqlx::query(
            "UPDATE replacement_offer SET status = 'declined'
             WHERE id = ? AND status = 'pending'",
        )
        .bind(&id.0)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut declined = offer;
        declined
            .transition_to(OfferStatus::Declined)
            .map_err(|error| RepositoryError::State(error.to_string()))?;
        Ok(DeclineOutcome::Declined(declined))
    }

    async fn find_accepted_for_lecture(
        &self,
        lecture_id: &LectureId,
    ) -> Result<Option<ReplacementOffer>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {OFFER_COLUMNS} FROM replacement_offer
             WHERE lecture_id = ? AND status = 'accepted'"
        ))
        .bind(&lecture_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(Some(offer_from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn list_for_lecture(
        &self,
        lecture_id: &LectureId,
    ) -> Result<Vec<ReplacementOffer>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {OFFER_COLUMNS} FROM replacement_offer
             WHERE lecture_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(&lecture_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(offer_from_row).collect()
    }

    async fn list_for_accepter(
        &self,
        accepter_id: &UserId,
    ) -> Result<Vec<ReplacementOffer>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {OFFER_COLUMNS} FROM replacement_offer
             WHERE accepter_id = ? ORDER BY created_at DESC, id ASC"
        ))
        .bind(&accepter_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(offer_from_row).collect()
    }

    async fn list_for_offerer(
        &self,
        offerer_id: &UserId,
    ) -> Result<Vec<ReplacementOffer>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {OFFER_COLUMNS} FROM replacement_offer
             WHERE offerer_id = ? ORDER BY created_at DESC, id ASC"
        ))
        .bind(&offerer_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(offer_from_row).collect()
    }
}
