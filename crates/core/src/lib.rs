pub mod config;
pub mod domain;
pub mod errors;
pub mod escalation;
pub mod notify;
pub mod slots;

pub use domain::leave::{LeaveDocument, LeaveRequest, LeaveRequestId, LeaveStatus};
pub use domain::lecture::{Lecture, LectureId, SlotWindow, SubjectId, TimeSlot, TimeSlotId, WeekDay};
pub use domain::offer::{OfferId, OfferStatus, ReplacementOffer};
pub use domain::teacher::{Caller, Role, Teacher, TeacherStatus, UserId};
pub use errors::{ApplicationError, DomainError};
pub use escalation::{ApprovalStage, ApprovalTier, EscalationAction, EscalationPolicy, EscalationRefusal};
pub use notify::{NoopNotifier, NotificationEvent, Notifier, NotifyError, RecordingNotifier};
