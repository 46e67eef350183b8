use chrono::NaiveTime;

use crate::domain::lecture::SlotWindow;

/// Day-template grid the timetable is laid out on. One row per teaching
/// hour; the stored `TimeSlot` reference rows are a subset of this grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DayTemplate {
    pub start_hour: u32,
    pub end_hour: u32,
    pub slot_minutes: u32,
}

impl Default for DayTemplate {
    fn default() -> Self {
        Self { start_hour: 8, end_hour: 17, slot_minutes: 60 }
    }
}

impl DayTemplate {
    pub fn windows(&self) -> Vec<SlotWindow> {
        let mut windows = Vec::new();
        let mut minutes = self.start_hour * 60;
        let end = self.end_hour * 60;

        while minutes + self.slot_minutes <= end {
            let start = NaiveTime::from_num_seconds_from_midnight_opt(minutes * 60, 0);
            let finish =
                NaiveTime::from_num_seconds_from_midnight_opt((minutes + self.slot_minutes) * 60, 0);
            if let (Some(start), Some(finish)) = (start, finish) {
                windows.push(SlotWindow::new(start, finish));
            }
            minutes += self.slot_minutes;
        }

        windows
    }
}
