//! Gap Guardian: false break of the session's opening bar inside the entry window.
//!
//! Long when a bar trades below the opening bar's low and closes back above
//! it; short when a bar trades above the opening bar's high and closes back
//! below it. Only bars inside the parameterised entry window are considered.

use crate::domain::{names, Bar, Direction, ParameterSet};

use super::{session_start, Signal, StrategyEvaluator, TimeWindow};

pub const DEFAULT_ENTRY_START_HOUR: f64 = 9.0;
pub const DEFAULT_ENTRY_START_MINUTE: f64 = 30.0;
pub const DEFAULT_ENTRY_END_HOUR: f64 = 11.0;
pub const DEFAULT_ENTRY_END_MINUTE: f64 = 0.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct GapGuardian;

impl GapGuardian {
    /// Entry window from `entry_*` parameters, falling back to 09:30–11:00.
    pub fn entry_window(params: &ParameterSet) -> Option<TimeWindow> {
        let part = |name: &str, default: f64| -> Option<u32> {
            let v = params.get_or(name, default);
            (v.is_finite() && v >= 0.0).then(|| v.round() as u32)
        };
        TimeWindow::from_hm(
            part(names::ENTRY_START_HOUR, DEFAULT_ENTRY_START_HOUR)?,
            part(names::ENTRY_START_MINUTE, DEFAULT_ENTRY_START_MINUTE)?,
            part(names::ENTRY_END_HOUR, DEFAULT_ENTRY_END_HOUR)?,
            part(names::ENTRY_END_MINUTE, DEFAULT_ENTRY_END_MINUTE)?,
        )
    }
}

impl StrategyEvaluator for GapGuardian {
    fn name(&self) -> &str {
        "Gap Guardian"
    }

    fn warmup_bars(&self) -> usize {
        2
    }

    fn is_active(&self, bar: &Bar, params: &ParameterSet) -> bool {
        Self::entry_window(params).is_some_and(|w| w.contains(bar.local_time()))
    }

    fn evaluate(&self, history: &[Bar], _params: &ParameterSet) -> Option<Signal> {
        let start = session_start(history)?;
        let current = history.last()?;
        if start == history.len() - 1 {
            // The opening bar defines the range; it cannot break it.
            return None;
        }
        let opening = &history[start];

        if current.low < opening.low && current.close > opening.low {
            return Some(Signal {
                direction: Direction::Long,
                reference_price: current.close,
            });
        }
        if current.high > opening.high && current.close < opening.high {
            return Some(Signal {
                direction: Direction::Short,
                reference_price: current.close,
            });
        }
        None
    }
}
