//! Bar: the fundamental market data unit.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for one symbol and one timeframe step.
///
/// The timestamp carries the exchange's UTC offset, so `local_time()` and
/// `session_date()` are exchange-local without any further conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= 0.0
    }

    /// Exchange-local wall-clock time of the bar.
    pub fn local_time(&self) -> NaiveTime {
        self.timestamp.time()
    }

    /// Exchange-local calendar date of the bar.
    pub fn session_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Structural problems in a bar sequence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar {index} at {timestamp} is not after the previous bar")]
    NotIncreasing { index: usize, timestamp: String },
    #[error("bar {index} at {timestamp} has inconsistent OHLC values")]
    Insane { index: usize, timestamp: String },
}

/// Check that a sequence is strictly increasing in time and every bar is sane.
pub fn validate_series(bars: &[Bar]) -> Result<(), BarError> {
    for (index, bar) in bars.iter().enumerate() {
        if !bar.is_sane() {
            return Err(BarError::Insane {
                index,
                timestamp: bar.timestamp.to_rfc3339(),
            });
        }
        if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
            return Err(BarError::NotIncreasing {
                index,
                timestamp: bar.timestamp.to_rfc3339(),
            });
        }
    }
    Ok(())
}
