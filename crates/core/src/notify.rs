use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::leave::LeaveRequest;
use crate::domain::offer::ReplacementOffer;
use crate::domain::teacher::{Role, UserId};

/// Push event emitted after a committed workflow transition. The payload is
/// the updated entity; consumers receive `{ "type": ..., "data": ... }`.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum NotificationEvent {
    NewLeaveRequest(LeaveRequest),
    LeaveForwarded(LeaveRequest),
    LeaveApproved(LeaveRequest),
    LeaveDenied(LeaveRequest),
    NewReplacementOffer(ReplacementOffer),
    OfferAccepted(ReplacementOffer),
    OfferDeclined(ReplacementOffer),
}

impl NotificationEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::NewLeaveRequest(_) => "newLeaveRequest",
            Self::LeaveForwarded(_) => "leaveForwarded",
            Self::LeaveApproved(_) => "leaveApproved",
            Self::LeaveDenied(_) => "leaveDenied",
            Self::NewReplacementOffer(_) => "newReplacementOffer",
            Self::OfferAccepted(_) => "offerAccepted",
            Self::OfferDeclined(_) => "offerDeclined",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Best-effort push channel to live connections. Implementations must
/// enqueue the event and return promptly; delivery happens out of band, so
/// a send can never stall or roll back a committed transition. An `Err` is
/// an enqueue failure, logged and dropped by the engine.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &UserId, event: NotificationEvent) -> Result<(), NotifyError>;

    /// Broadcast to every connected user holding `role`. Approval-queue
    /// events address a tier, not a person.
    async fn notify_role(&self, role: Role, event: NotificationEvent) -> Result<(), NotifyError>;
}

/// Drops every event. Used when no connection registry is wired in.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _user_id: &UserId, _event: NotificationEvent) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn notify_role(&self, _role: Role, _event: NotificationEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Test double that records every dispatched event.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(UserId, NotificationEvent)>>,
    broadcast: Mutex<Vec<(Role, NotificationEvent)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(UserId, NotificationEvent)> {
        self.sent.lock().expect("notifier log poisoned").clone()
    }

    pub fn broadcasts(&self) -> Vec<(Role, NotificationEvent)> {
        self.broadcast.lock().expect("notifier log poisoned").clone()
    }

    pub fn event_types_for(&self, user_id: &UserId) -> Vec<&'static str> {
        self.sent()
            .iter()
            .filter(|(recipient, _)| recipient == user_id)
            .map(|(_, event)| event.event_type())
            .collect()
    }

    pub fn event_types_for_role(&self, role: Role) -> Vec<&'static str> {
        self.broadcasts()
            .iter()
            .filter(|(recipient, _)| *recipient == role)
            .map(|(_, event)| event.event_type())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: &UserId, event: NotificationEvent) -> Result<(), NotifyError> {
        self.sent.lock().expect("notifier log poisoned").push((user_id.clone(), event));
        Ok(())
    }

    async fn notify_role(&self, role: Role, event: NotificationEvent) -> Result<(), NotifyError> {
        self.broadcast.lock().expect("notifier log poisoned").push((role, event));
        Ok(())
    }
}
