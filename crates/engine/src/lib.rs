pub mod escalation;
pub mod leaves;
pub mod matcher;
pub mod offers;

pub use escalation::EscalationCoordinator;
pub use leaves::{LeaveService, LeaveSubmission, NewLeaveRequest};
pub use matcher::{AvailabilityMatcher, SwapCandidate};
pub use offers::OfferService;

use classcover_core::domain::teacher::{Role, UserId};
use classcover_core::errors::ApplicationError;
use classcover_core::notify::{NotificationEvent, Notifier};
use classcover_db::repositories::RepositoryError;

pub(crate) fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Post-commit dispatch. The notifier contract is a non-blocking enqueue,
/// so awaiting it here cannot stall the caller; a failed enqueue is logged
/// and dropped, never unwinding the committed transition.
pub(crate) async fn send_to_user(
    notifier: &dyn Notifier,
    user_id: &UserId,
    event: NotificationEvent,
) {
    let event_type = event.event_type();
    if let Err(error) = notifier.notify(user_id, event).await {
        tracing::warn!(user = %user_id.0, event = event_type, %error, "notification dropped");
    }
}

pub(crate) async fn send_to_role(notifier: &dyn Notifier, role: Role, event: NotificationEvent) {
    let event_type = event.event_type();
    if let Err(error) = notifier.notify_role(role, event).await {
        tracing::warn!(?role, event = event_type, %error, "notification dropped");
    }
}
