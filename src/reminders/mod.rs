//! Medication reminders at fixed times of day

mod schedule;

pub use schedule::{ReminderSchedule, ScheduleError, DEFAULT_REMINDER_TEXT};
