use async_trait::async_trait;
use thiserror::Error;

use classcover_core::domain::leave::{LeaveDocument, LeaveRequest, LeaveRequestId, LeaveStatus};
use classcover_core::domain::lecture::{Lecture, LectureId, SlotWindow, TimeSlot, TimeSlotId, WeekDay};
use classcover_core::domain::offer::{OfferId, OfferStatus, ReplacementOffer};
use classcover_core::domain::teacher::{Teacher, UserId};

pub mod leave;
pub mod lecture;
pub mod offer;
pub mod teacher;
pub mod timeslot;

pub use leave::SqlLeaveRepository;
pub use lecture::SqlLectureRepository;
pub use offer::SqlOfferRepository;
pub use teacher::SqlTeacherRepository;
pub use timeslot::SqlTimeSlotRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    /// A guarded write and the re-read row disagree about the status
    /// machine. Indicates drift between the schema and the domain rules.
    #[error("row state conflicts with the workflow rules: {0}")]
    State(String),
}

#[async_trait]
pub trait TeacherRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<Teacher>, RepositoryError>;

    /// Availability Matcher selection: ACTIVE teachers who hold a lecture
    /// at `week_day x replace_slot` and none at `week_day x original_slot`,
    /// excluding the requester. Each candidate is paired with the lecture
    /// they hold at the replace slot. Ordered by teacher id so a fixed
    /// database state yields a fixed result.
    async fn list_swap_candidates(
        &self,
        week_day: WeekDay,
        replace_slot_id: &TimeSlotId,
        original_slot_id: &TimeSlotId,
        exclude: &UserId,
    ) -> Result<Vec<(Teacher, Lecture)>, RepositoryError>;

    async fn insert(&self, teacher: &Teacher) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait TimeSlotRepository: Send + Sync {
    async fn find_by_id(&self, id: &TimeSlotId) -> Result<Option<TimeSlot>, RepositoryError>;

    /// Resolves a caller-supplied wall-clock window against stored
    /// reference data; `None` is the `SlotNotFound` case upstream.
    async fn find_by_window(&self, window: &SlotWindow) -> Result<Option<TimeSlot>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<TimeSlot>, RepositoryError>;

    async fn insert(&self, slot: &TimeSlot) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait LectureRepository: Send + Sync {
    async fn find_by_id(&self, id: &LectureId) -> Result<Option<Lecture>, RepositoryError>;

    async fn list_for_teacher_on_day(
        &self,
        teacher_id: &UserId,
        week_day: WeekDay,
    ) -> Result<Vec<Lecture>, RepositoryError>;

    async fn insert(&self, lecture: &Lecture) -> Result<(), RepositoryError>;
}

/// Result of the guarded HOD forward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForwardOutcome {
    Forwarded(LeaveRequest),
    /// The hard business rule: forwarding without an accepted offer is
    /// disallowed, checked inside the same transaction.
    NoCoverage,
    NotPendingHod { status: LeaveStatus, already_forwarded: bool },
    NotFound,
}

/// Result of the admin-tier final approval transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Approved { request: LeaveRequest, offer: ReplacementOffer },
    NoCoverage,
    /// Schedule re-validation failed: state drifted since acceptance.
    Conflict { teacher_id: UserId, lecture_id: LectureId },
    NotPending { status: LeaveStatus },
    NotFound,
}

/// Result of a denial, at either tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DenyOutcome {
    Denied { request: LeaveRequest, declined_offers: Vec<ReplacementOffer> },
    NotPending { status: LeaveStatus },
    NotFound,
}

#[async_trait]
pub trait LeaveRepository: Send + Sync {
    /// Inserts the request, its supporting-document key, and the initial
    /// offer fan-out in one transaction; a failure partway leaves nothing
    /// behind.
    async fn insert(
        &self,
        request: &LeaveRequest,
        document: Option<&LeaveDocument>,
        offers: &[ReplacementOffer],
    ) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &LeaveRequestId) -> Result<Option<LeaveRequest>, RepositoryError>;

    /// Feasibility probe: the live request for a (requester, lecture)
    /// pair, if one exists.
    async fn find_live_for(
        &self,
        requester_id: &UserId,
        lecture_id: &LectureId,
    ) -> Result<Option<LeaveRequest>, RepositoryError>;

    async fn find_document(
        &self,
        request_id: &LeaveRequestId,
    ) -> Result<Option<LeaveDocument>, RepositoryError>;

    async fn forward_to_admin(
        &self,
        request_id: &LeaveRequestId,
        hod_id: &UserId,
    ) -> Result<ForwardOutcome, RepositoryError>;

    async fn finalize_approval(
        &self,
        request_id: &LeaveRequestId,
        admin_id: &UserId,
    ) -> Result<FinalizeOutcome, RepositoryError>;

    async fn deny(
        &self,
        request_id: &LeaveRequestId,
        approver_id: &UserId,
        message: &str,
    ) -> Result<DenyOutcome, RepositoryError>;

    async fn list_pending_hod(&self) -> Result<Vec<LeaveRequest>, RepositoryError>;

    async fn list_pending_admin(&self) -> Result<Vec<LeaveRequest>, RepositoryError>;

    async fn list_for_requester(
        &self,
        requester_id: &UserId,
    ) -> Result<Vec<LeaveRequest>, RepositoryError>;
}

/// Result of an exclusive accept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcceptOutcome {
    Accepted { offer: ReplacementOffer, declined_siblings: Vec<ReplacementOffer> },
    AlreadyDecided { current: OfferStatus },
    NotFound,
}

/// Result of a candidate's decline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclineOutcome {
    Declined(ReplacementOffer),
    AlreadyDecided { current: OfferStatus },
    NotFound,
}

#[async_trait]
pub trait OfferRepository: Send + Sync {
    /// Bulk fan-out insert; all rows or none.
    async fn create_fan_out(&self, offers: &[ReplacementOffer]) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &OfferId) -> Result<Option<ReplacementOffer>, RepositoryError>;

    /// Accepts one offer and declines every pending sibling for the same
    /// lecture in one transaction. The status is re-read inside the
    /// transaction, so the loser of a race observes `AlreadyDecided`.
    async fn accept_exclusive(&self, id: &OfferId) -> Result<AcceptOutcome, RepositoryError>;

    async fn decline(&self, id: &OfferId) -> Result<DeclineOutcome, RepositoryError>;

    async fn find_accepted_for_lecture(
        &self,
        lecture_id: &LectureId,
    ) -> Result<Option<ReplacementOffer>, RepositoryError>;

    async fn list_for_lecture(
        &self,
        lecture_id: &LectureId,
    ) -> Result<Vec<ReplacementOffer>, RepositoryError>;

    async fn list_for_accepter(
        &self,
        accepter_id: &UserId,
    ) -> Result<Vec<ReplacementOffer>, RepositoryError>;

    async fn list_for_offerer(
        &self,
        offerer_id: &UserId,
    ) -> Result<Vec<ReplacementOffer>, RepositoryError>;
}
