use chrono::NaiveTime;
use thiserror::Error;

use crate::domain::leave::LeaveStatus;
use crate::domain::offer::OfferStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid leave transition from {from:?} to {to:?}")]
    InvalidLeaveTransition { from: LeaveStatus, to: LeaveStatus },
    #[error("invalid offer transition from {from:?} to {to:?}")]
    InvalidOfferTransition { from: OfferStatus, to: OfferStatus },
    /// A create/approve/reject precondition failed. Never retried
    /// automatically; the reason is surfaced verbatim.
    #[error("infeasible action: {0}")]
    Infeasible(String),
    /// Someone else acted on the entity between read and write. Safe to
    /// retry after re-fetching current state.
    #[error("already decided: {0}")]
    AlreadyDecided(String),
    /// Re-validation at final approval found a newly conflicting
    /// assignment; the whole replacement chain must be redone.
    #[error("schedule conflict: {0}")]
    ScheduleConflict(String),
    /// The supplied window matches no stored day-template slot.
    #[error("no stored time slot matches {start}..{end}")]
    SlotNotFound { start: NaiveTime, end: NaiveTime },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Transient store faults are retryable at the action boundary; every
    /// action is a single bounded transaction, so a retry after a timeout
    /// re-runs the precondition checks rather than duplicating effects.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Integration(_))
    }
}
