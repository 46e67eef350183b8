use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::leave::LeaveRequestId;
use crate::domain::lecture::LectureId;
use crate::domain::teacher::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfferId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Declined,
}

/// One candidate's invitation to cover a lecture. `offerer_id` is the
/// teacher who needs coverage; `accepter_id` is the candidate being asked.
/// When `replace_lecture_id` is set the offer is a two-way slot swap: the
/// accepter's own lecture in the offered window goes to the offerer at
/// final approval.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementOffer {
    pub id: OfferId,
    pub lecture_id: LectureId,
    pub offerer_id: UserId,
    pub accepter_id: UserId,
    pub replace_lecture_id: Option<LectureId>,
    pub leave_id: Option<LeaveRequestId>,
    pub approver_id: Option<UserId>,
    pub status: OfferStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ReplacementOffer {
    pub fn can_transition_to(&self, next: OfferStatus) -> bool {
        matches!(
            (self.status, next),
            (OfferStatus::Pending, OfferStatus::Accepted)
                | (OfferStatus::Pending, OfferStatus::Declined)
                // A leave denial voids an acceptance (cascade decline).
                | (OfferStatus::Accepted, OfferStatus::Declined)
        )
    }

    pub fn transition_to(&mut self, next: OfferStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidOfferTransition { from: self.status, to: next })
    }
}
