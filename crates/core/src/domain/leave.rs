use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::lecture::LectureId;
use crate::domain::teacher::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaveRequestId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Denied,
}

/// A teacher's request to be relieved of one scheduled lecture. Terminal
/// requests are retained as audit records and never mutated again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: LeaveRequestId,
    pub requester_id: UserId,
    pub lecture_id: LectureId,
    pub reason: String,
    pub status: LeaveStatus,
    pub approver_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeaveRequest {
    /// A live request blocks a second one for the same (requester, lecture).
    pub fn is_live(&self) -> bool {
        self.status == LeaveStatus::Pending
    }

    pub fn can_transition_to(&self, next: LeaveStatus) -> bool {
        matches!(
            (self.status, next),
            (LeaveStatus::Pending, LeaveStatus::Approved)
                | (LeaveStatus::Pending, LeaveStatus::Denied)
        )
    }

    pub fn transition_to(&mut self, next: LeaveStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidLeaveTransition { from: self.status, to: next })
    }
}

/// Pointer to a leave-supporting document held by the external document
/// store. The engine records the opaque key and never inspects it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveDocument {
    pub id: String,
    pub leave_request_id: LeaveRequestId,
    pub applicant_id: UserId,
    pub object_key: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::lecture::LectureId;
    use crate::domain::teacher::UserId;

    use super::{LeaveRequest, LeaveRequestId, LeaveStatus};

    fn request(status: LeaveStatus) -> LeaveRequest {
        let now = Utc::now();
        LeaveRequest {
            id: LeaveRequestId("lr-1".to_string()),
            requester_id: UserId("t-1".to_string()),
            lecture_id: LectureId("lec-1".to_string()),
            reason: "medical".to_string(),
            status,
            approver_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn pending_request_can_be_decided_either_way() {
        let mut approved = request(LeaveStatus::Pending);
        approved.transition_to(LeaveStatus::Approved).expect("pending -> approved");

        let mut denied = request(LeaveStatus::Pending);
        denied.transition_to(LeaveStatus::Denied).expect("pending -> denied");
    }

    #[test]
    fn decided_request_is_immutable() {
        let mut request = request(LeaveStatus::Approved);
        let error =
            request.transition_to(LeaveStatus::Denied).expect_err("approved -> denied must fail");
        assert!(matches!(error, crate::errors::DomainError::InvalidLeaveTransition { .. }));
        assert_eq!(request.status, LeaveStatus::Approved);
    }

    #[test]
    fn only_pending_requests_are_live() {
        assert!(request(LeaveStatus::Pending).is_live());
        assert!(!request(LeaveStatus::Approved).is_live());
        assert!(!request(LeaveStatus::Denied).is_live());
    }
}
