//! Daily reminder slots
//!
//! Slots are wall-clock times with minute precision. The assistant loop asks
//! for the next slot after the current local time, sleeps until it, then
//! asks for the slot after the one that just fired.

use std::time::Duration;

use chrono::NaiveTime;

/// What the assistant says when a slot fires
pub const DEFAULT_REMINDER_TEXT: &str = "It's time for your medication";

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid reminder time {0:?}, expected HH:MM")]
    InvalidTime(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderSchedule {
    /// Sorted, no duplicates
    times: Vec<NaiveTime>,
    pub message: String,
}

impl Default for ReminderSchedule {
    fn default() -> Self {
        let times = [(9, 0), (13, 0), (18, 0)]
            .into_iter()
            .filter_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0));
        Self::new(times)
    }
}

impl ReminderSchedule {
    pub fn new(times: impl IntoIterator<Item = NaiveTime>) -> Self {
        let mut times: Vec<_> = times.into_iter().collect();
        times.sort();
        times.dedup();
        Self {
            times,
            message: DEFAULT_REMINDER_TEXT.to_string(),
        }
    }

    /// A schedule that never fires
    pub fn disabled() -> Self {
        Self::new([])
    }

    /// Parse a comma-separated `HH:MM` list. An empty list disables reminders.
    pub fn parse(list: &str) -> Result<Self, ScheduleError> {
        let times = list
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| {
                NaiveTime::parse_from_str(t, "%H:%M")
                    .map_err(|_| ScheduleError::InvalidTime(t.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(times))
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// First slot strictly after `now`, wrapping to tomorrow, and how long
    /// until it
    pub fn next_after(&self, now: NaiveTime) -> Option<(NaiveTime, Duration)> {
        let slot = self
            .times
            .iter()
            .copied()
            .find(|t| *t > now)
            .or_else(|| self.times.first().copied())?;
        Some((slot, wait(now, slot)))
    }
}

fn wait(from: NaiveTime, to: NaiveTime) -> Duration {
    let mut delta = to.signed_duration_since(from);
    if delta <= chrono::Duration::zero() {
        delta = delta + chrono::Duration::hours(24);
    }
    delta.to_std().unwrap_or_default()
}
