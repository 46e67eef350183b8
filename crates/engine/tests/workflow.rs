//! End-to-end coverage workflow over the seeded demo timetable.
//!
//! The grid puts teacher-1 in Period 3 (10:00) on Monday; teacher-3 and
//! teacher-6 are the only teachers holding a Period 5 (13:00) lecture who
//! are free at 10:00, so a 13:00 swap window fans out exactly two offers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveTime;

use classcover_core::config::{AppConfig, DatabaseConfig};
use classcover_core::domain::lecture::{LectureId, SlotWindow, WeekDay};
use classcover_core::domain::teacher::{Caller, Role, UserId};
use classcover_core::errors::{ApplicationError, DomainError};
use classcover_core::escalation::ApprovalStage;
use classcover_core::notify::{NotificationEvent, Notifier, NotifyError, RecordingNotifier};
use classcover_db::repositories::{
    SqlLeaveRepository, SqlLectureRepository, SqlOfferRepository, SqlTeacherRepository,
    SqlTimeSlotRepository,
};
use classcover_db::{connect, migrations, TimetableSeedDataset};
use classcover_engine::{
    AvailabilityMatcher, EscalationCoordinator, LeaveService, LeaveSubmission, NewLeaveRequest,
    OfferService,
};

struct Harness {
    pool: sqlx::SqlitePool,
    leaves: LeaveService,
    offers: OfferService,
    escalation: EscalationCoordinator,
    notifier: Arc<RecordingNotifier>,
}

async fn seeded_pool() -> sqlx::SqlitePool {
    let pool = connect(&DatabaseConfig::ephemeral()).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    TimetableSeedDataset::load(&pool).await.expect("seed timetable");
    pool
}

fn services(
    pool: &sqlx::SqlitePool,
    notifier: Arc<dyn Notifier>,
) -> (LeaveService, OfferService, EscalationCoordinator) {
    let teachers = Arc::new(SqlTeacherRepository::new(pool.clone()));
    let lectures = Arc::new(SqlLectureRepository::new(pool.clone()));
    let slots = Arc::new(SqlTimeSlotRepository::new(pool.clone()));
    let leave_repo = Arc::new(SqlLeaveRepository::new(pool.clone()));
    let offer_repo = Arc::new(SqlOfferRepository::new(pool.clone()));

    let leaves = LeaveService::new(
        leave_repo.clone(),
        lectures.clone(),
        teachers.clone(),
        AvailabilityMatcher::new(teachers.clone(), lectures.clone(), slots.clone()),
        AppConfig::default().documents,
        notifier.clone(),
    );
    let offers = OfferService::new(
        offer_repo,
        lectures.clone(),
        AvailabilityMatcher::new(teachers, lectures, slots),
        notifier.clone(),
    );
    let escalation = EscalationCoordinator::new(leave_repo, notifier);

    (leaves, offers, escalation)
}

async fn harness() -> Harness {
    let pool = seeded_pool().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let (leaves, offers, escalation) = services(&pool, notifier.clone());

    Harness { pool, leaves, offers, escalation, notifier }
}

/// Stand-in for a connection registry that rejects every enqueue.
struct DeadLetterNotifier;

#[async_trait]
impl Notifier for DeadLetterNotifier {
    async fn notify(&self, _: &UserId, _: NotificationEvent) -> Result<(), NotifyError> {
        Err(NotifyError("connection registry offline".to_string()))
    }

    async fn notify_role(&self, _: Role, _: NotificationEvent) -> Result<(), NotifyError> {
        Err(NotifyError("connection registry offline".to_string()))
    }
}

fn window(start_hour: u32, end_hour: u32) -> SlotWindow {
    SlotWindow::new(
        NaiveTime::from_hms_opt(start_hour, 0, 0).expect("start"),
        NaiveTime::from_hms_opt(end_hour, 0, 0).expect("end"),
    )
}

fn teacher(id: &str) -> Caller {
    Caller::new(id, Role::Teacher)
}

fn hod() -> Caller {
    Caller::new("hod-1", Role::Hod)
}

fn admin() -> Caller {
    Caller::new("admin-1", Role::Admin)
}

/// teacher-1 requests cover for their Monday Period 3 lecture, offering to
/// teach a Period 5 lecture in exchange.
async fn submit_leave(harness: &Harness) -> LeaveSubmission {
    harness
        .leaves
        .create(
            &teacher("teacher-1"),
            NewLeaveRequest {
                lecture_id: LectureId("lec-t1-d1-s3".to_string()),
                reason: "medical appointment".to_string(),
                attach_document: true,
                swap_window: Some(window(13, 14)),
            },
        )
        .await
        .expect("submit leave")
}

fn offer_for<'a>(
    submission: &'a LeaveSubmission,
    accepter: &str,
) -> &'a classcover_core::domain::offer::ReplacementOffer {
    submission
        .offers
        .iter()
        .find(|offer| offer.accepter_id.0 == accepter)
        .expect("offer for accepter")
}

async fn lecture_teacher(pool: &sqlx::SqlitePool, lecture: &str) -> String {
    sqlx::query_scalar("SELECT teacher_id FROM lecture WHERE id = ?")
        .bind(lecture)
        .fetch_one(pool)
        .await
        .expect("lecture teacher")
}

#[tokio::test]
async fn fan_out_targets_free_candidates_and_acceptance_is_exclusive() {
    let harness = harness().await;
    let submission = submit_leave(&harness).await;

    let mut accepters: Vec<&str> =
        submission.offers.iter().map(|offer| offer.accepter_id.0.as_str()).collect();
    accepters.sort();
    assert_eq!(accepters, vec!["teacher-3", "teacher-6"]);

    let document = submission.document.as_ref().expect("document");
    assert_eq!(document.object_key, "leaves/Dr. Rohan S/lec-t1-d1-s3.pdf");

    assert_eq!(harness.notifier.event_types_for_role(Role::Hod), vec!["newLeaveRequest"]);
    assert_eq!(
        harness.notifier.event_types_for(&UserId("teacher-3".to_string())),
        vec!["newReplacementOffer"]
    );

    let accepted = harness
        .offers
        .accept(&teacher("teacher-3"), &offer_for(&submission, "teacher-3").id)
        .await
        .expect("accept");
    assert_eq!(accepted.accepter_id.0, "teacher-3");

    // The sibling was declined in the same transaction, so the other
    // candidate can no longer act on it.
    let race = harness
        .offers
        .accept(&teacher("teacher-6"), &offer_for(&submission, "teacher-6").id)
        .await;
    assert!(matches!(race, Err(ApplicationError::Domain(DomainError::AlreadyDecided(_)))));

    assert_eq!(
        harness.notifier.event_types_for(&UserId("teacher-1".to_string())),
        vec!["offerAccepted"]
    );
    assert_eq!(
        harness.notifier.event_types_for(&UserId("teacher-6".to_string())),
        vec!["newReplacementOffer", "offerDeclined"]
    );
}

#[tokio::test]
async fn forwarding_requires_accepted_coverage() {
    let harness = harness().await;
    let submission = submit_leave(&harness).await;

    let refused = harness.escalation.approve(&hod(), &submission.request.id).await;
    assert!(matches!(refused, Err(ApplicationError::Domain(DomainError::Infeasible(_)))));

    harness
        .offers
        .accept(&teacher("teacher-3"), &offer_for(&submission, "teacher-3").id)
        .await
        .expect("accept");

    let forwarded =
        harness.escalation.approve(&hod(), &submission.request.id).await.expect("forward");
    assert_eq!(ApprovalStage::of(&forwarded), ApprovalStage::PendingAdmin);
    assert_eq!(forwarded.approver_id, Some(UserId("hod-1".to_string())));

    assert_eq!(harness.notifier.event_types_for_role(Role::Admin), vec!["leaveForwarded"]);

    // The HOD's part is done; a replay belongs to the admin queue.
    let replay = harness.escalation.approve(&hod(), &submission.request.id).await;
    assert!(matches!(replay, Err(ApplicationError::Domain(DomainError::Infeasible(_)))));
}

#[tokio::test]
async fn admin_approval_commits_the_two_way_swap() {
    let harness = harness().await;
    let submission = submit_leave(&harness).await;

    let offer = offer_for(&submission, "teacher-3");
    assert_eq!(offer.replace_lecture_id.as_ref().expect("swap lecture").0, "lec-t3-d1-s6");

    harness.offers.accept(&teacher("teacher-3"), &offer.id).await.expect("accept");
    harness.escalation.approve(&hod(), &submission.request.id).await.expect("forward");

    let approved =
        harness.escalation.approve(&admin(), &submission.request.id).await.expect("finalize");
    assert_eq!(ApprovalStage::of(&approved), ApprovalStage::Approved);
    assert_eq!(approved.approver_id, Some(UserId("admin-1".to_string())));

    // Covered lecture to the accepter, their Period 5 lecture back to the
    // requester.
    assert_eq!(lecture_teacher(&harness.pool, "lec-t1-d1-s3").await, "teacher-3");
    assert_eq!(lecture_teacher(&harness.pool, "lec-t3-d1-s6").await, "teacher-1");

    assert!(harness
        .notifier
        .event_types_for(&UserId("teacher-1".to_string()))
        .contains(&"leaveApproved"));
}

#[tokio::test]
async fn denial_voids_the_acceptance_without_touching_the_timetable() {
    let harness = harness().await;
    let submission = submit_leave(&harness).await;

    harness
        .offers
        .accept(&teacher("teacher-3"), &offer_for(&submission, "teacher-3").id)
        .await
        .expect("accept");

    let denied = harness
        .escalation
        .reject(&hod(), &submission.request.id, Some("exams week"))
        .await
        .expect("deny");
    assert_eq!(ApprovalStage::of(&denied), ApprovalStage::Denied);

    let voided = harness
        .offers
        .for_lecture(&LectureId("lec-t1-d1-s3".to_string()))
        .await
        .expect("offers");
    assert!(voided
        .iter()
        .all(|offer| offer.message.as_deref() == Some("Leave request was denied. Reason: exams week")));

    assert_eq!(lecture_teacher(&harness.pool, "lec-t1-d1-s3").await, "teacher-1");
    assert_eq!(lecture_teacher(&harness.pool, "lec-t3-d1-s6").await, "teacher-3");

    assert!(harness
        .notifier
        .event_types_for(&UserId("teacher-1".to_string()))
        .contains(&"leaveDenied"));
    assert!(harness
        .notifier
        .event_types_for(&UserId("teacher-3".to_string()))
        .contains(&"offerDeclined"));
}

#[tokio::test]
async fn drifted_schedule_fails_final_approval_and_keeps_the_request_pending() {
    let harness = harness().await;
    let submission = submit_leave(&harness).await;

    harness
        .offers
        .accept(&teacher("teacher-3"), &offer_for(&submission, "teacher-3").id)
        .await
        .expect("accept");
    harness.escalation.approve(&hod(), &submission.request.id).await.expect("forward");

    // Between forwarding and final approval the accepter picks up a new
    // Monday Period 3 lecture.
    sqlx::query(
        "INSERT INTO lecture (id, teacher_id, subject_id, time_slot_id, week_day, date, room)
         VALUES ('lec-drift', 'teacher-3', 'subject-3', 'slot-3', 1, '2025-01-06', 'R201')",
    )
    .execute(&harness.pool)
    .await
    .expect("drifted lecture");

    let conflicted = harness.escalation.approve(&admin(), &submission.request.id).await;
    assert!(matches!(
        conflicted,
        Err(ApplicationError::Domain(DomainError::ScheduleConflict(_)))
    ));

    let queue = harness.escalation.pending_for(&admin()).await.expect("admin queue");
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, submission.request.id);
    assert_eq!(lecture_teacher(&harness.pool, "lec-t1-d1-s3").await, "teacher-1");
}

#[tokio::test]
async fn duplicate_live_requests_are_refused() {
    let harness = harness().await;
    submit_leave(&harness).await;

    let duplicate = harness
        .leaves
        .create(
            &teacher("teacher-1"),
            NewLeaveRequest {
                lecture_id: LectureId("lec-t1-d1-s3".to_string()),
                reason: "second thoughts".to_string(),
                attach_document: false,
                swap_window: None,
            },
        )
        .await;
    assert!(matches!(duplicate, Err(ApplicationError::Domain(DomainError::Infeasible(_)))));
}

#[tokio::test]
async fn unresolved_swap_windows_are_rejected_before_any_write() {
    let harness = harness().await;

    let off_grid = harness
        .leaves
        .create(
            &teacher("teacher-1"),
            NewLeaveRequest {
                lecture_id: LectureId("lec-t1-d1-s3".to_string()),
                reason: "medical appointment".to_string(),
                attach_document: false,
                swap_window: Some(SlotWindow::new(
                    NaiveTime::from_hms_opt(13, 30, 0).expect("start"),
                    NaiveTime::from_hms_opt(14, 30, 0).expect("end"),
                )),
            },
        )
        .await;
    assert!(matches!(
        off_grid,
        Err(ApplicationError::Domain(DomainError::SlotNotFound { .. }))
    ));

    let history =
        harness.leaves.history(&UserId("teacher-1".to_string())).await.expect("history");
    assert!(history.is_empty());
}

#[tokio::test]
async fn empty_slots_follow_the_booked_grid() {
    let harness = harness().await;

    // Rebuild a matcher over the same pool; teacher-1 teaches 08:00-11:00
    // on Monday, so six of the nine template windows stay free.
    let teachers = Arc::new(SqlTeacherRepository::new(harness.pool.clone()));
    let lectures = Arc::new(SqlLectureRepository::new(harness.pool.clone()));
    let slots = Arc::new(SqlTimeSlotRepository::new(harness.pool.clone()));
    let matcher = AvailabilityMatcher::new(teachers, lectures, slots);

    let free = matcher
        .empty_slots(&UserId("teacher-1".to_string()), WeekDay::new(1).expect("monday"))
        .await
        .expect("empty slots");
    assert_eq!(free.len(), 6);
    assert_eq!(free[0].start, NaiveTime::from_hms_opt(11, 0, 0).expect("11:00"));
}

#[tokio::test]
async fn notifier_failures_never_fail_committed_transitions() {
    let pool = seeded_pool().await;
    let (leaves, offers, escalation) = services(&pool, Arc::new(DeadLetterNotifier));

    let submission = leaves
        .create(
            &teacher("teacher-1"),
            NewLeaveRequest {
                lecture_id: LectureId("lec-t1-d1-s3".to_string()),
                reason: "medical appointment".to_string(),
                attach_document: false,
                swap_window: Some(window(13, 14)),
            },
        )
        .await
        .expect("submit with a dead notifier");

    offers
        .accept(&teacher("teacher-3"), &offer_for(&submission, "teacher-3").id)
        .await
        .expect("accept with a dead notifier");
    escalation.approve(&hod(), &submission.request.id).await.expect("forward with a dead notifier");
    let approved = escalation
        .approve(&admin(), &submission.request.id)
        .await
        .expect("finalize with a dead notifier");

    // Every push failed to enqueue, yet the workflow ran to completion
    // and the swap landed.
    assert_eq!(ApprovalStage::of(&approved), ApprovalStage::Approved);
    assert_eq!(lecture_teacher(&pool, "lec-t1-d1-s3").await, "teacher-3");
}

#[tokio::test]
async fn empty_candidate_sets_fan_out_nothing() {
    let harness = harness().await;

    // Every other teacher holding a Monday Period 1 lecture is also booked
    // at Period 3, so an 08:00 swap window matches nobody.
    let standalone = harness
        .offers
        .fan_out(&teacher("teacher-1"), &LectureId("lec-t1-d1-s3".to_string()), &window(8, 9))
        .await
        .expect("standalone fan-out");
    assert!(standalone.is_empty());

    let submission = harness
        .leaves
        .create(
            &teacher("teacher-1"),
            NewLeaveRequest {
                lecture_id: LectureId("lec-t1-d1-s3".to_string()),
                reason: "medical appointment".to_string(),
                attach_document: false,
                swap_window: Some(window(8, 9)),
            },
        )
        .await
        .expect("submit without candidates");
    assert!(submission.offers.is_empty());

    // The request exists but cannot clear the coverage gate until an
    // offer is accepted through some other path.
    let gated = harness.escalation.approve(&hod(), &submission.request.id).await;
    assert!(matches!(gated, Err(ApplicationError::Domain(DomainError::Infeasible(_)))));
}

#[tokio::test]
async fn teachers_cannot_work_the_approval_queues() {
    let harness = harness().await;
    let submission = submit_leave(&harness).await;

    let queue = harness.escalation.pending_for(&teacher("teacher-2")).await;
    assert!(matches!(queue, Err(ApplicationError::Domain(DomainError::Infeasible(_)))));

    let approve = harness.escalation.approve(&teacher("teacher-2"), &submission.request.id).await;
    assert!(matches!(approve, Err(ApplicationError::Domain(DomainError::Infeasible(_)))));
}
