//! Unicorn: fair-value gap that displaces through the last confirmed swing.

use crate::domain::{Bar, Direction, ParameterSet};

use super::{fair_value_gap, Signal, StrategyEvaluator};

/// Bars on each side that define a swing point.
pub const DEFAULT_SWING_LOOKBACK: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct Unicorn {
    pub swing_lookback: usize,
}

impl Default for Unicorn {
    fn default() -> Self {
        Self {
            swing_lookback: DEFAULT_SWING_LOOKBACK,
        }
    }
}

impl Unicorn {
    /// Most recent swing high confirmed by `history` (needs `lookback` bars after it).
    pub fn last_swing_high(&self, history: &[Bar]) -> Option<f64> {
        self.last_swing(history, |candidate, other| other.high <= candidate.high)
            .map(|i| history[i].high)
    }

    /// Most recent swing low confirmed by `history`.
    pub fn last_swing_low(&self, history: &[Bar]) -> Option<f64> {
        self.last_swing(history, |candidate, other| other.low >= candidate.low)
            .map(|i| history[i].low)
    }

    fn last_swing(&self, history: &[Bar], dominates: impl Fn(&Bar, &Bar) -> bool) -> Option<usize> {
        let lb = self.swing_lookback;
        if lb == 0 || history.len() < 2 * lb + 1 {
            return None;
        }
        let last_confirmed = history.len() - 1 - lb;
        (lb..=last_confirmed).rev().find(|&j| {
            let candidate = &history[j];
            history[j - lb..=j + lb]
                .iter()
                .enumerate()
                .all(|(k, other)| k == lb || dominates(candidate, other))
        })
    }
}

impl StrategyEvaluator for Unicorn {
    fn name(&self) -> &str {
        "Unicorn"
    }

    fn warmup_bars(&self) -> usize {
        2 * self.swing_lookback + 1
    }

    fn is_active(&self, _bar: &Bar, _params: &ParameterSet) -> bool {
        true
    }

    fn evaluate(&self, history: &[Bar], _params: &ParameterSet) -> Option<Signal> {
        let current = history.last()?;
        match fair_value_gap(history)? {
            Direction::Long => {
                let swing = self.last_swing_high(history)?;
                (current.close > swing).then_some(Signal {
                    direction: Direction::Long,
                    reference_price: current.close,
                })
            }
            Direction::Short => {
                let swing = self.last_swing_low(history)?;
                (current.close < swing).then_some(Signal {
                    direction: Direction::Short,
                    reference_price: current.close,
                })
            }
        }
    }
}
