use std::sync::Arc;

use classcover_core::domain::lecture::{Lecture, LectureId, SlotWindow, WeekDay};
use classcover_core::domain::teacher::{Teacher, UserId};
use classcover_core::errors::{ApplicationError, DomainError};
use classcover_core::slots::DayTemplate;
use classcover_db::repositories::{LectureRepository, TeacherRepository, TimeSlotRepository};

use crate::persistence;

/// A teacher able to cover the requester's lecture, paired with the lecture
/// of theirs the requester would take over in exchange.
#[derive(Clone, Debug)]
pub struct SwapCandidate {
    pub teacher: Teacher,
    pub replace_lecture: Lecture,
}

/// Read-only candidate selection over the timetable. Results are a
/// snapshot; the final approval transaction re-validates them.
pub struct AvailabilityMatcher {
    teachers: Arc<dyn TeacherRepository>,
    lectures: Arc<dyn LectureRepository>,
    slots: Arc<dyn TimeSlotRepository>,
    template: DayTemplate,
}

impl AvailabilityMatcher {
    pub fn new(
        teachers: Arc<dyn TeacherRepository>,
        lectures: Arc<dyn LectureRepository>,
        slots: Arc<dyn TimeSlotRepository>,
    ) -> Self {
        Self { teachers, lectures, slots, template: DayTemplate::default() }
    }

    /// Teachers who hold a lecture in `swap_window` on the covered
    /// lecture's day and are free during the covered lecture itself. The
    /// window must resolve against a stored slot row before anything is
    /// matched.
    pub async fn available_teachers(
        &self,
        lecture_id: &LectureId,
        swap_window: &SlotWindow,
    ) -> Result<Vec<SwapCandidate>, ApplicationError> {
        let lecture = self
            .lectures
            .find_by_id(lecture_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| {
                DomainError::Infeasible(format!("lecture `{}` does not exist", lecture_id.0))
            })?;

        let replace_slot = self
            .slots
            .find_by_window(swap_window)
            .await
            .map_err(persistence)?
            .ok_or(DomainError::SlotNotFound { start: swap_window.start, end: swap_window.end })?;

        let candidates = self
            .teachers
            .list_swap_candidates(
                lecture.week_day,
                &replace_slot.id,
                &lecture.time_slot_id,
                &lecture.teacher_id,
            )
            .await
            .map_err(persistence)?;

        Ok(candidates
            .into_iter()
            .map(|(teacher, replace_lecture)| SwapCandidate { teacher, replace_lecture })
            .collect())
    }

    /// Free windows on the day-template grid for a teacher on one weekday.
    pub async fn empty_slots(
        &self,
        teacher_id: &UserId,
        week_day: WeekDay,
    ) -> Result<Vec<SlotWindow>, ApplicationError> {
        let lectures =
            self.lectures.list_for_teacher_on_day(teacher_id, week_day).await.map_err(persistence)?;

        let mut booked = Vec::with_capacity(lectures.len());
        for lecture in &lectures {
            let slot = self
                .slots
                .find_by_id(&lecture.time_slot_id)
                .await
                .map_err(persistence)?
                .ok_or_else(|| {
                    DomainError::InvariantViolation(format!(
                        "lecture `{}` references missing slot `{}`",
                        lecture.id.0, lecture.time_slot_id.0
                    ))
                })?;
            booked.push(SlotWindow::from(&slot));
        }

        Ok(self
            .template
            .windows()
            .into_iter()
            .filter(|window| !booked.iter().any(|taken| window.overlaps(taken)))
            .collect())
    }
}
