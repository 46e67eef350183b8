use std::sync::Arc;

use classcover_core::domain::leave::{LeaveRequest, LeaveRequestId};
use classcover_core::domain::teacher::{Caller, Role};
use classcover_core::errors::{ApplicationError, DomainError};
use classcover_core::escalation::{ApprovalStage, ApprovalTier, EscalationAction, EscalationPolicy};
use classcover_core::notify::{NotificationEvent, Notifier};
use classcover_db::repositories::{DenyOutcome, FinalizeOutcome, ForwardOutcome, LeaveRepository};

use crate::{persistence, send_to_role, send_to_user};

/// Two-tier approval chain. The policy decides which tier handles the
/// caller's action; the repository transaction enforces the matching
/// preconditions a second time under the write lock.
pub struct EscalationCoordinator {
    leaves: Arc<dyn LeaveRepository>,
    policy: EscalationPolicy,
    notifier: Arc<dyn Notifier>,
}

impl EscalationCoordinator {
    pub fn new(leaves: Arc<dyn LeaveRepository>, notifier: Arc<dyn Notifier>) -> Self {
        Self { leaves, policy: EscalationPolicy, notifier }
    }

    /// HOD tier forwards; admin tier commits the timetable mutation.
    pub async fn approve(
        &self,
        caller: &Caller,
        request_id: &LeaveRequestId,
    ) -> Result<LeaveRequest, ApplicationError> {
        let request = self.load(request_id).await?;
        let stage = ApprovalStage::of(&request);
        let tier = self
            .policy
            .authorize(caller.role, EscalationAction::Approve, stage)
            .map_err(DomainError::from)?;

        match tier {
            ApprovalTier::Hod => self.forward(caller, request_id).await,
            ApprovalTier::Admin => self.finalize(caller, request_id).await,
        }
    }

    /// Denies at either tier and voids the replacement chain. No lecture
    /// is reassigned on a denial.
    pub async fn reject(
        &self,
        caller: &Caller,
        request_id: &LeaveRequestId,
        note: Option<&str>,
    ) -> Result<LeaveRequest, ApplicationError> {
        let request = self.load(request_id).await?;
        let stage = ApprovalStage::of(&request);
        self.policy
            .authorize(caller.role, EscalationAction::Reject, stage)
            .map_err(DomainError::from)?;

        let message = denial_message(note);
        match self.leaves.deny(request_id, &caller.user_id, &message).await.map_err(persistence)? {
            DenyOutcome::Denied { request, declined_offers } => {
                tracing::info!(
                    request = %request.id.0,
                    approver = %caller.user_id.0,
                    voided_offers = declined_offers.len(),
                    "leave request denied"
                );
                send_to_user(
                    self.notifier.as_ref(),
                    &request.requester_id,
                    NotificationEvent::LeaveDenied(request.clone()),
                )
                .await;
                for offer in &declined_offers {
                    send_to_user(
                        self.notifier.as_ref(),
                        &offer.accepter_id,
                        NotificationEvent::OfferDeclined(offer.clone()),
                    )
                    .await;
                }
                Ok(request)
            }
            DenyOutcome::NotPending { status } => {
                Err(DomainError::AlreadyDecided(format!("leave request is already {status:?}"))
                    .into())
            }
            DenyOutcome::NotFound => Err(request_missing(request_id)),
        }
    }

    /// The queue the caller's tier works from.
    pub async fn pending_for(
        &self,
        caller: &Caller,
    ) -> Result<Vec<LeaveRequest>, ApplicationError> {
        match caller.role {
            Role::Hod => self.leaves.list_pending_hod().await.map_err(persistence),
            Role::Admin => self.leaves.list_pending_admin().await.map_err(persistence),
            Role::Teacher => Err(DomainError::Infeasible(
                "role Teacher is not allowed to act on leave requests".to_string(),
            )
            .into()),
        }
    }

    async fn forward(
        &self,
        caller: &Caller,
        request_id: &LeaveRequestId,
    ) -> Result<LeaveRequest, ApplicationError> {
        match self
            .leaves
            .forward_to_admin(request_id, &caller.user_id)
            .await
            .map_err(persistence)?
        {
            ForwardOutcome::Forwarded(request) => {
                tracing::info!(
                    request = %request.id.0,
                    hod = %caller.user_id.0,
                    "leave request forwarded to admin tier"
                );
                send_to_role(
                    self.notifier.as_ref(),
                    Role::Admin,
                    NotificationEvent::LeaveForwarded(request.clone()),
                )
                .await;
                send_to_user(
                    self.notifier.as_ref(),
                    &request.requester_id,
                    NotificationEvent::LeaveForwarded(request.clone()),
                )
                .await;
                Ok(request)
            }
            ForwardOutcome::NoCoverage => Err(DomainError::Infeasible(
                "no accepted replacement offer covers the lecture".to_string(),
            )
            .into()),
            ForwardOutcome::NotPendingHod { status, already_forwarded } => {
                let detail = if already_forwarded {
                    "leave request was already forwarded to the administrator".to_string()
                } else {
                    format!("leave request is already {status:?}")
                };
                Err(DomainError::AlreadyDecided(detail).into())
            }
            ForwardOutcome::NotFound => Err(request_missing(request_id)),
        }
    }

    async fn finalize(
        &self,
        caller: &Caller,
        request_id: &LeaveRequestId,
    ) -> Result<LeaveRequest, ApplicationError> {
        match self
            .leaves
            .finalize_approval(request_id, &caller.user_id)
            .await
            .map_err(persistence)?
        {
            FinalizeOutcome::Approved { request, offer } => {
                tracing::info!(
                    request = %request.id.0,
                    admin = %caller.user_id.0,
                    covering = %offer.accepter_id.0,
                    "leave request approved, timetable updated"
                );
                send_to_user(
                    self.notifier.as_ref(),
                    &request.requester_id,
                    NotificationEvent::LeaveApproved(request.clone()),
                )
                .await;
                send_to_user(
                    self.notifier.as_ref(),
                    &offer.accepter_id,
                    NotificationEvent::LeaveApproved(request.clone()),
                )
                .await;
                Ok(request)
            }
            FinalizeOutcome::NoCoverage => Err(DomainError::Infeasible(
                "no accepted replacement offer covers the lecture".to_string(),
            )
            .into()),
            FinalizeOutcome::Conflict { teacher_id, lecture_id } => {
                Err(DomainError::ScheduleConflict(format!(
                    "teacher `{}` is no longer free to take lecture `{}`",
                    teacher_id.0, lecture_id.0
                ))
                .into())
            }
            FinalizeOutcome::NotPending { status } => {
                Err(DomainError::AlreadyDecided(format!("leave request is already {status:?}"))
                    .into())
            }
            FinalizeOutcome::NotFound => Err(request_missing(request_id)),
        }
    }

    async fn load(&self, request_id: &LeaveRequestId) -> Result<LeaveRequest, ApplicationError> {
        self.leaves
            .find_by_id(request_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| request_missing(request_id))
    }
}

fn denial_message(note: Option<&str>) -> String {
    let note = note.map(str::trim).filter(|note| !note.is_empty()).unwrap_or("N/A");
    format!("Leave request was denied. Reason: {note}")
}

fn request_missing(request_id: &LeaveRequestId) -> ApplicationError {
    DomainError::Infeasible(format!("leave request `{}` does not exist", request_id.0)).into()
}
