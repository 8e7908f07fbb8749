//! Window splitter: full range or rolling in-sample / out-of-sample pairs.
//!
//! All ranges are half-open calendar-date intervals `[start, end)` over each
//! bar's exchange-local date. A walk-forward roll whose out-of-sample end
//! would pass the range end is dropped, never truncated.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ictlab_core::domain::Bar;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("empty date range: end {end} is not after start {start}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },

    #[error("{field} must be at least 1 day")]
    ZeroDays { field: &'static str },

    #[error("walk-forward needs {needed} days (in-sample + out-of-sample) but the range has {available}")]
    RangeTooShort { needed: i64, available: i64 },
}

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Smallest range containing every bar's session date.
    pub fn covering(bars: &[Bar]) -> Option<Self> {
        let first = bars.first()?.session_date();
        let last = bars.last()?.session_date();
        Some(Self {
            start: first,
            end: last + Duration::days(1),
        })
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Full,
    InSample,
    OutOfSample,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub kind: WindowKind,
    /// Walk-forward roll index; `None` for a full window.
    pub roll: Option<usize>,
}

impl Window {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// The contiguous run of `bars` whose session date falls in the window.
    /// `bars` must be sorted by timestamp.
    pub fn slice<'a>(&self, bars: &'a [Bar]) -> &'a [Bar] {
        let lo = bars.partition_point(|b| b.session_date() < self.start);
        let hi = bars.partition_point(|b| b.session_date() < self.end);
        &bars[lo..hi.max(lo)]
    }

    pub fn label(&self) -> String {
        let kind = match self.kind {
            WindowKind::Full => "full",
            WindowKind::InSample => "is",
            WindowKind::OutOfSample => "oos",
        };
        match self.roll {
            Some(roll) => format!("{kind}#{roll} {}..{}", self.start, self.end),
            None => format!("{kind} {}..{}", self.start, self.end),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SplitMode {
    Single,
    WalkForward {
        in_sample_days: u32,
        out_of_sample_days: u32,
        step_days: u32,
    },
}

/// Check a split configuration against a range without producing windows.
pub fn validate(range: DateRange, mode: &SplitMode) -> Result<(), WindowError> {
    if range.end <= range.start {
        return Err(WindowError::EmptyRange {
            start: range.start,
            end: range.end,
        });
    }
    if let SplitMode::WalkForward {
        in_sample_days,
        out_of_sample_days,
        step_days,
    } = *mode
    {
        for (field, value) in [
            ("in_sample_days", in_sample_days),
            ("out_of_sample_days", out_of_sample_days),
            ("step_days", step_days),
        ] {
            if value == 0 {
                return Err(WindowError::ZeroDays { field });
            }
        }
        let needed = i64::from(in_sample_days) + i64::from(out_of_sample_days);
        if needed > range.days() {
            return Err(WindowError::RangeTooShort {
                needed,
                available: range.days(),
            });
        }
    }
    Ok(())
}

/// Split `range` into evaluation windows.
///
/// Walk-forward output is ordered by roll, in-sample before out-of-sample.
pub fn split(range: DateRange, mode: &SplitMode) -> Result<Vec<Window>, WindowError> {
    validate(range, mode)?;
    let SplitMode::WalkForward {
        in_sample_days,
        out_of_sample_days,
        step_days,
    } = *mode
    else {
        return Ok(vec![Window {
            start: range.start,
            end: range.end,
            kind: WindowKind::Full,
            roll: None,
        }]);
    };

    let is_len = Duration::days(i64::from(in_sample_days));
    let oos_len = Duration::days(i64::from(out_of_sample_days));
    let step = Duration::days(i64::from(step_days));

    let mut windows = Vec::new();
    let mut roll = 0;
    let mut is_start = range.start;
    loop {
        let oos_start = is_start + is_len;
        let oos_end = oos_start + oos_len;
        if oos_end > range.end {
            break;
        }
        windows.push(Window {
            start: is_start,
            end: oos_start,
            kind: WindowKind::InSample,
            roll: Some(roll),
        });
        windows.push(Window {
            start: oos_start,
            end: oos_end,
            kind: WindowKind::OutOfSample,
            roll: Some(roll),
        });
        roll += 1;
        is_start += step;
    }
    Ok(windows)
}
