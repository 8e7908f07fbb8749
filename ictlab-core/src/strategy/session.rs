//! Exchange-local time-of-day windows.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Half-open wall-clock window `[start, end)`.
///
/// A window whose end is not after its start never matches; overnight
/// windows are not used by any shipped strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Window from whole hours and minutes. Out-of-range values yield `None`.
    pub fn from_hm(start_hour: u32, start_minute: u32, end_hour: u32, end_minute: u32) -> Option<Self> {
        Some(Self {
            start: NaiveTime::from_hms_opt(start_hour, start_minute, 0)?,
            end: NaiveTime::from_hms_opt(end_hour, end_minute, 0)?,
        })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn half_open_bounds() {
        let w = TimeWindow::from_hm(9, 30, 11, 0).unwrap();
        assert!(w.contains(t(9, 30)));
        assert!(w.contains(t(10, 59)));
        assert!(!w.contains(t(11, 0)));
        assert!(!w.contains(t(9, 29)));
    }

    #[test]
    fn inverted_window_never_matches() {
        let w = TimeWindow::from_hm(11, 0, 9, 30).unwrap();
        assert!(!w.contains(t(10, 0)));
    }

    #[test]
    fn invalid_hour_rejected() {
        assert!(TimeWindow::from_hm(25, 0, 26, 0).is_none());
    }
}
