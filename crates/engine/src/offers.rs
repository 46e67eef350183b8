use std::sync::Arc;

use chrono::Utc;

use classcover_core::domain::lecture::{LectureId, SlotWindow};
use classcover_core::domain::offer::{OfferId, OfferStatus, ReplacementOffer};
use classcover_core::domain::teacher::{Caller, UserId};
use classcover_core::errors::{ApplicationError, DomainError};
use classcover_core::notify::{NotificationEvent, Notifier};
use classcover_db::repositories::{
    AcceptOutcome, DeclineOutcome, LectureRepository, OfferRepository,
};

use crate::matcher::AvailabilityMatcher;
use crate::{new_id, persistence, send_to_user};

pub struct OfferService {
    offers: Arc<dyn OfferRepository>,
    lectures: Arc<dyn LectureRepository>,
    matcher: AvailabilityMatcher,
    notifier: Arc<dyn Notifier>,
}

impl OfferService {
    pub fn new(
        offers: Arc<dyn OfferRepository>,
        lectures: Arc<dyn LectureRepository>,
        matcher: AvailabilityMatcher,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { offers, lectures, matcher, notifier }
    }

    /// Standalone fan-out for a lecture swap outside any leave request.
    /// One pending offer per available teacher, inserted all-or-nothing;
    /// an empty match fans out nothing.
    pub async fn fan_out(
        &self,
        caller: &Caller,
        lecture_id: &LectureId,
        swap_window: &SlotWindow,
    ) -> Result<Vec<ReplacementOffer>, ApplicationError> {
        let lecture = self
            .lectures
            .find_by_id(lecture_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| {
                DomainError::Infeasible(format!("lecture `{}` does not exist", lecture_id.0))
            })?;
        if lecture.teacher_id != caller.user_id {
            return Err(DomainError::Infeasible(format!(
                "lecture `{}` is not taught by the caller",
                lecture.id.0
            ))
            .into());
        }

        let candidates = self.matcher.available_teachers(lecture_id, swap_window).await?;

        let now = Utc::now();
        let offers: Vec<ReplacementOffer> = candidates
            .iter()
            .map(|candidate| ReplacementOffer {
                id: OfferId(new_id()),
                lecture_id: lecture.id.clone(),
                offerer_id: caller.user_id.clone(),
                accepter_id: candidate.teacher.id.clone(),
                replace_lecture_id: Some(candidate.replace_lecture.id.clone()),
                leave_id: None,
                approver_id: None,
                status: OfferStatus::Pending,
                message: None,
                created_at: now,
            })
            .collect();

        self.offers.create_fan_out(&offers).await.map_err(persistence)?;

        tracing::info!(lecture = %lecture.id.0, offers = offers.len(), "replacement offers fanned out");
        for offer in &offers {
            send_to_user(
                self.notifier.as_ref(),
                &offer.accepter_id,
                NotificationEvent::NewReplacementOffer(offer.clone()),
            )
            .await;
        }

        Ok(offers)
    }

    /// Accepts an offer on behalf of the offered teacher. Pending siblings
    /// for the same lecture are declined in the same transaction; a second
    /// accept for the lecture observes `AlreadyDecided`.
    pub async fn accept(
        &self,
        caller: &Caller,
        offer_id: &OfferId,
    ) -> Result<ReplacementOffer, ApplicationError> {
        self.check_accepter(caller, offer_id).await?;

        match self.offers.accept_exclusive(offer_id).await.map_err(persistence)? {
            AcceptOutcome::Accepted { offer, declined_siblings } => {
                tracing::info!(
                    offer = %offer.id.0,
                    lecture = %offer.lecture_id.0,
                    declined = declined_siblings.len(),
                    "replacement offer accepted"
                );
                send_to_user(
                    self.notifier.as_ref(),
                    &offer.offerer_id,
                    NotificationEvent::OfferAccepted(offer.clone()),
                )
                .await;
                for sibling in &declined_siblings {
                    send_to_user(
                        self.notifier.as_ref(),
                        &sibling.accepter_id,
                        NotificationEvent::OfferDeclined(sibling.clone()),
                    )
                    .await;
                }
                Ok(offer)
            }
            AcceptOutcome::AlreadyDecided { current } => Err(DomainError::AlreadyDecided(
                format!("offer `{}` is already {current:?}", offer_id.0),
            )
            .into()),
            AcceptOutcome::NotFound => Err(offer_missing(offer_id)),
        }
    }

    pub async fn decline(
        &self,
        caller: &Caller,
        offer_id: &OfferId,
    ) -> Result<ReplacementOffer, ApplicationError> {
        self.check_accepter(caller, offer_id).await?;

        match self.offers.decline(offer_id).await.map_err(persistence)? {
            DeclineOutcome::Declined(offer) => {
                tracing::info!(offer = %offer.id.0, "replacement offer declined");
                send_to_user(
                    self.notifier.as_ref(),
                    &offer.offerer_id,
                    NotificationEvent::OfferDeclined(offer.clone()),
                )
                .await;
                Ok(offer)
            }
            DeclineOutcome::AlreadyDecided { current } => Err(DomainError::AlreadyDecided(
                format!("offer `{}` is already {current:?}", offer_id.0),
            )
            .into()),
            DeclineOutcome::NotFound => Err(offer_missing(offer_id)),
        }
    }

    /// Offers waiting on the caller's answer.
    pub async fn inbox(
        &self,
        accepter_id: &UserId,
    ) -> Result<Vec<ReplacementOffer>, ApplicationError> {
        self.offers.list_for_accepter(accepter_id).await.map_err(persistence)
    }

    /// Offers the caller fanned out to others.
    pub async fn outbox(
        &self,
        offerer_id: &UserId,
    ) -> Result<Vec<ReplacementOffer>, ApplicationError> {
        self.offers.list_for_offerer(offerer_id).await.map_err(persistence)
    }

    pub async fn for_lecture(
        &self,
        lecture_id: &LectureId,
    ) -> Result<Vec<ReplacementOffer>, ApplicationError> {
        self.offers.list_for_lecture(lecture_id).await.map_err(persistence)
    }

    async fn check_accepter(
        &self,
        caller: &Caller,
        offer_id: &OfferId,
    ) -> Result<(), ApplicationError> {
        let offer = self
            .offers
            .find_by_id(offer_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| offer_missing(offer_id))?;
        if offer.accepter_id != caller.user_id {
            return Err(DomainError::Infeasible(
                "only the offered teacher can answer an offer".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

fn offer_missing(offer_id: &OfferId) -> ApplicationError {
    DomainError::Infeasible(format!("offer `{}` does not exist", offer_id.0)).into()
}
