use serde::{Deserialize, Serialize};

use crate::domain::leave::{LeaveRequest, LeaveStatus};
use crate::domain::teacher::Role;
use crate::errors::DomainError;

/// Tagged approval stage, derived in exactly one place from the stored
/// (status, approver_id) pair. A pending request with an approver already
/// stamped has been forwarded by a department head and sits in the admin
/// queue; readers must consume this enum instead of re-deriving the rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStage {
    PendingHod,
    PendingAdmin,
    Approved,
    Denied,
}

impl ApprovalStage {
    pub fn of(request: &LeaveRequest) -> Self {
        match (request.status, request.approver_id.as_ref()) {
            (LeaveStatus::Pending, None) => Self::PendingHod,
            (LeaveStatus::Pending, Some(_)) => Self::PendingAdmin,
            (LeaveStatus::Approved, _) => Self::Approved,
            (LeaveStatus::Denied, _) => Self::Denied,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Denied)
    }
}

/// The tier whose rule set handles an authorized action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalTier {
    /// Forward: stamp the approver, status stays pending.
    Hod,
    /// Final decision: commit or deny the timetable mutation.
    Admin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscalationAction {
    Approve,
    Reject,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EscalationRefusal {
    CallerNotApprover { role: Role },
    RequestAlreadyDecided { stage: ApprovalStage },
    AlreadyForwarded,
}

impl EscalationRefusal {
    fn reason(&self) -> String {
        match self {
            Self::CallerNotApprover { role } => {
                format!("role {role:?} is not allowed to act on leave requests")
            }
            Self::RequestAlreadyDecided { stage } => {
                format!("leave request is already {stage:?}")
            }
            Self::AlreadyForwarded => {
                "leave request was already forwarded to the administrator".to_string()
            }
        }
    }
}

impl From<EscalationRefusal> for DomainError {
    fn from(refusal: EscalationRefusal) -> Self {
        match refusal {
            EscalationRefusal::RequestAlreadyDecided { stage } => {
                DomainError::AlreadyDecided(format!("leave request is already {stage:?}"))
            }
            other => DomainError::Infeasible(other.reason()),
        }
    }
}

/// Role x action x stage rule table for the two-tier approval chain.
#[derive(Clone, Copy, Debug, Default)]
pub struct EscalationPolicy;

impl EscalationPolicy {
    pub fn authorize(
        &self,
        caller_role: Role,
        action: EscalationAction,
        stage: ApprovalStage,
    ) -> Result<ApprovalTier, EscalationRefusal> {
        if caller_role == Role::Teacher {
            return Err(EscalationRefusal::CallerNotApprover { role: caller_role });
        }
        if stage.is_terminal() {
            return Err(EscalationRefusal::RequestAlreadyDecided { stage });
        }

        match (caller_role, action, stage) {
            (Role::Hod, _, ApprovalStage::PendingHod) => Ok(ApprovalTier::Hod),
            // Once forwarded, the request belongs to the admin queue.
            (Role::Hod, _, ApprovalStage::PendingAdmin) => Err(EscalationRefusal::AlreadyForwarded),
            // Admins decide forwarded requests, and direct ones in
            // configurations without a department head.
            (Role::Admin, _, _) => Ok(ApprovalTier::Admin),
            (Role::Teacher, ..) => unreachable!("teachers rejected above"),
            (Role::Hod, _, ApprovalStage::Approved | ApprovalStage::Denied) => {
                unreachable!("terminal stages rejected above")
            }
        }
    }
}
