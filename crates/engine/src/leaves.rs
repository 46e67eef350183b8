use std::sync::Arc;

use chrono::Utc;

use classcover_core::config::DocumentsConfig;
use classcover_core::domain::leave::{LeaveDocument, LeaveRequest, LeaveRequestId, LeaveStatus};
use classcover_core::domain::lecture::{LectureId, SlotWindow};
use classcover_core::domain::offer::{OfferId, OfferStatus, ReplacementOffer};
use classcover_core::domain::teacher::{Caller, Role, UserId};
use classcover_core::errors::{ApplicationError, DomainError};
use classcover_core::notify::{NotificationEvent, Notifier};
use classcover_db::repositories::{LeaveRepository, LectureRepository, TeacherRepository};

use crate::matcher::AvailabilityMatcher;
use crate::{new_id, persistence, send_to_role, send_to_user};

/// Input for a leave submission. `swap_window` is the period the requester
/// is willing to teach in exchange; when present, offers fan out to every
/// available teacher in the same transaction as the request.
#[derive(Clone, Debug)]
pub struct NewLeaveRequest {
    pub lecture_id: LectureId,
    pub reason: String,
    pub attach_document: bool,
    pub swap_window: Option<SlotWindow>,
}

#[derive(Clone, Debug)]
pub struct LeaveSubmission {
    pub request: LeaveRequest,
    pub document: Option<LeaveDocument>,
    pub offers: Vec<ReplacementOffer>,
}

pub struct LeaveService {
    leaves: Arc<dyn LeaveRepository>,
    lectures: Arc<dyn LectureRepository>,
    teachers: Arc<dyn TeacherRepository>,
    matcher: AvailabilityMatcher,
    documents: DocumentsConfig,
    notifier: Arc<dyn Notifier>,
}

impl LeaveService {
    pub fn new(
        leaves: Arc<dyn LeaveRepository>,
        lectures: Arc<dyn LectureRepository>,
        teachers: Arc<dyn TeacherRepository>,
        matcher: AvailabilityMatcher,
        documents: DocumentsConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { leaves, lectures, teachers, matcher, documents, notifier }
    }

    /// Submits a leave request for one of the caller's lectures. The
    /// request starts in the department head's queue; a feasibility failure
    /// leaves nothing behind.
    pub async fn create(
        &self,
        caller: &Caller,
        input: NewLeaveRequest,
    ) -> Result<LeaveSubmission, ApplicationError> {
        if caller.role != Role::Teacher {
            return Err(
                DomainError::Infeasible("only teachers submit leave requests".to_string()).into()
            );
        }
        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(
                DomainError::Infeasible("a leave request needs a reason".to_string()).into()
            );
        }

        let lecture = self
            .lectures
            .find_by_id(&input.lecture_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| {
                DomainError::Infeasible(format!("lecture `{}` does not exist", input.lecture_id.0))
            })?;
        if lecture.teacher_id != caller.user_id {
            return Err(DomainError::Infeasible(format!(
                "lecture `{}` is not taught by the requester",
                lecture.id.0
            ))
            .into());
        }

        if self
            .leaves
            .find_live_for(&caller.user_id, &lecture.id)
            .await
            .map_err(persistence)?
            .is_some()
        {
            return Err(DomainError::Infeasible(format!(
                "a pending leave request already covers lecture `{}`",
                lecture.id.0
            ))
            .into());
        }

        let requester = self
            .teachers
            .find_by_id(&caller.user_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| {
                DomainError::Infeasible(format!(
                    "teacher `{}` is not in the staff directory",
                    caller.user_id.0
                ))
            })?;

        let now = Utc::now();
        let request = LeaveRequest {
            id: LeaveRequestId(new_id()),
            requester_id: caller.user_id.clone(),
            lecture_id: lecture.id.clone(),
            reason: reason.to_string(),
            status: LeaveStatus::Pending,
            approver_id: None,
            created_at: now,
            updated_at: now,
        };

        let document = input.attach_document.then(|| LeaveDocument {
            id: new_id(),
            leave_request_id: request.id.clone(),
            applicant_id: caller.user_id.clone(),
            object_key: self.documents.leave_document_key(&requester.name, &lecture.id),
            created_at: now,
        });

        let mut offers = Vec::new();
        if let Some(window) = &input.swap_window {
            for candidate in self.matcher.available_teachers(&lecture.id, window).await? {
                offers.push(ReplacementOffer {
                    id: OfferId(new_id()),
                    lecture_id: lecture.id.clone(),
                    offerer_id: caller.user_id.clone(),
                    accepter_id: candidate.teacher.id.clone(),
                    replace_lecture_id: Some(candidate.replace_lecture.id.clone()),
                    leave_id: Some(request.id.clone()),
                    approver_id: None,
                    status: OfferStatus::Pending,
                    message: None,
                    created_at: now,
                });
            }
        }

        self.leaves.insert(&request, document.as_ref(), &offers).await.map_err(persistence)?;

        tracing::info!(
            request = %request.id.0,
            lecture = %lecture.id.0,
            offers = offers.len(),
            "leave request submitted"
        );

        send_to_role(
            self.notifier.as_ref(),
            Role::Hod,
            NotificationEvent::NewLeaveRequest(request.clone()),
        )
        .await;
        for offer in &offers {
            send_to_user(
                self.notifier.as_ref(),
                &offer.accepter_id,
                NotificationEvent::NewReplacementOffer(offer.clone()),
            )
            .await;
        }

        Ok(LeaveSubmission { request, document, offers })
    }

    pub async fn history(
        &self,
        requester_id: &UserId,
    ) -> Result<Vec<LeaveRequest>, ApplicationError> {
        self.leaves.list_for_requester(requester_id).await.map_err(persistence)
    }

    pub async fn document_for(
        &self,
        request_id: &LeaveRequestId,
    ) -> Result<Option<LeaveDocument>, ApplicationError> {
        self.leaves.find_document(request_id).await.map_err(persistence)
    }
}
