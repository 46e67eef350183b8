use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::domain::teacher::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LectureId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlotId(pub String);

/// Weekday index, 0 = Sunday through 6 = Saturday, matching how the
/// timetable grid is keyed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekDay(u8);

impl WeekDay {
    pub fn new(day: u8) -> Result<Self, DomainError> {
        if day > 6 {
            return Err(DomainError::InvariantViolation(format!(
                "week day {day} is out of range 0..=6"
            )));
        }
        Ok(Self(day))
    }

    pub fn index(&self) -> u8 {
        self.0
    }
}

/// Day-template slot row. Immutable reference data; two slots are the same
/// teaching period when their wall-clock start/end match, independent of
/// any calendar date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: TimeSlotId,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub label: String,
}

/// A caller-supplied start/end pair. It is not trusted until it resolves
/// against a stored `TimeSlot`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SlotWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn matches(&self, slot: &TimeSlot) -> bool {
        self.start == slot.start_time && self.end == slot.end_time
    }

    /// Half-open wall-clock overlap; back-to-back periods do not collide.
    pub fn overlaps(&self, other: &SlotWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl From<&TimeSlot> for SlotWindow {
    fn from(slot: &TimeSlot) -> Self {
        Self { start: slot.start_time, end: slot.end_time }
    }
}

/// One scheduled teaching session. `teacher_id` is the only field the
/// workflow engine ever mutates, and only at final approval.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lecture {
    pub id: LectureId,
    pub teacher_id: UserId,
    pub subject_id: SubjectId,
    pub time_slot_id: TimeSlotId,
    pub week_day: WeekDay,
    pub date: NaiveDate,
    pub room: String,
}
