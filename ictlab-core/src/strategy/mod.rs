//! Strategy evaluation: maps a bar history to at most one entry decision.
//!
//! Strategies are position-agnostic: they see bars and parameters, never the
//! simulator's capital or open position. The simulator hands each strategy a
//! slice that ends at the current bar, so lookahead is impossible by
//! construction.

pub mod gap_guardian;
pub mod session;
pub mod silver_bullet;
pub mod unicorn;

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, Direction, ParameterSet};

pub use gap_guardian::GapGuardian;
pub use session::TimeWindow;
pub use silver_bullet::SilverBullet;
pub use unicorn::Unicorn;

/// A strategy's decision to enter at the current bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    /// Price the stop and target are measured from (normally the bar close).
    pub reference_price: f64,
}

/// Trait for strategy evaluators.
///
/// # Contract
/// Implementations must be total functions over finite bar slices: the
/// simulator imposes no timeout, so an evaluator that never returns stalls
/// its worker. `evaluate` may only read `history`, whose last element is the
/// bar being decided on.
pub trait StrategyEvaluator: Send + Sync {
    /// Human-readable name (e.g., "Gap Guardian").
    fn name(&self) -> &str;

    /// Number of bars needed before this strategy can produce output.
    fn warmup_bars(&self) -> usize {
        0
    }

    /// Whether `bar` falls inside the strategy's active-time window.
    fn is_active(&self, bar: &Bar, params: &ParameterSet) -> bool;

    /// Evaluate the strategy at the last bar of `history`.
    fn evaluate(&self, history: &[Bar], params: &ParameterSet) -> Option<Signal>;
}

/// Strategy selector used by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    GapGuardian,
    Unicorn,
    SilverBullet,
}

impl StrategyKind {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::GapGuardian => "Gap Guardian",
            Self::Unicorn => "Unicorn",
            Self::SilverBullet => "Silver Bullet",
        }
    }

    /// Build the evaluator with its reference settings.
    pub fn build(self) -> Strategy {
        match self {
            Self::GapGuardian => Strategy::GapGuardian(GapGuardian),
            Self::Unicorn => Strategy::Unicorn(Unicorn::default()),
            Self::SilverBullet => Strategy::SilverBullet(SilverBullet::default()),
        }
    }
}

/// Closed set of shipped strategies behind one evaluation interface.
#[derive(Debug, Clone)]
pub enum Strategy {
    GapGuardian(GapGuardian),
    Unicorn(Unicorn),
    SilverBullet(SilverBullet),
}

impl StrategyEvaluator for Strategy {
    fn name(&self) -> &str {
        match self {
            Self::GapGuardian(s) => s.name(),
            Self::Unicorn(s) => s.name(),
            Self::SilverBullet(s) => s.name(),
        }
    }

    fn warmup_bars(&self) -> usize {
        match self {
            Self::GapGuardian(s) => s.warmup_bars(),
            Self::Unicorn(s) => s.warmup_bars(),
            Self::SilverBullet(s) => s.warmup_bars(),
        }
    }

    fn is_active(&self, bar: &Bar, params: &ParameterSet) -> bool {
        match self {
            Self::GapGuardian(s) => s.is_active(bar, params),
            Self::Unicorn(s) => s.is_active(bar, params),
            Self::SilverBullet(s) => s.is_active(bar, params),
        }
    }

    fn evaluate(&self, history: &[Bar], params: &ParameterSet) -> Option<Signal> {
        match self {
            Self::GapGuardian(s) => s.evaluate(history, params),
            Self::Unicorn(s) => s.evaluate(history, params),
            Self::SilverBullet(s) => s.evaluate(history, params),
        }
    }
}

/// Three-bar fair-value gap ending at the last bar of `history`.
///
/// Bullish when the first bar's high is below the third bar's low, bearish
/// when the first bar's low is above the third bar's high.
pub fn fair_value_gap(history: &[Bar]) -> Option<Direction> {
    let n = history.len();
    if n < 3 {
        return None;
    }
    let first = &history[n - 3];
    let third = &history[n - 1];
    if first.high < third.low {
        Some(Direction::Long)
    } else if first.low > third.high {
        Some(Direction::Short)
    } else {
        None
    }
}

/// Index of the first bar of the current bar's session (same local date).
pub(crate) fn session_start(history: &[Bar]) -> Option<usize> {
    let current = history.last()?.session_date();
    let mut start = history.len() - 1;
    while start > 0 && history[start - 1].session_date() == current {
        start -= 1;
    }
    Some(start)
}


#[cfg(test)]
mod tests {
    use super::test_bars::bars_from;
    use super::*;

    #[test]
    fn bullish_gap_detected() {
        let bars = bars_from(
            "2024-03-04T10:00:00-05:00",
            &[
                (100.0, 101.0, 99.0, 100.5),
                (100.5, 104.0, 100.5, 103.5),
                (103.5, 105.0, 102.0, 104.5),
            ],
        );
        assert_eq!(fair_value_gap(&bars), Some(Direction::Long));
    }

    #[test]
    fn bearish_gap_detected() {
        let bars = bars_from(
            "2024-03-04T10:00:00-05:00",
            &[
                (100.0, 101.0, 99.0, 99.5),
                (99.5, 99.5, 96.0, 96.5),
                (96.5, 97.0, 95.0, 95.5),
            ],
        );
        assert_eq!(fair_value_gap(&bars), Some(Direction::Short));
    }

    #[test]
    fn overlapping_bars_have_no_gap() {
        let bars = bars_from(
            "2024-03-04T10:00:00-05:00",
            &[
                (100.0, 101.0, 99.0, 100.0),
                (100.0, 101.0, 99.0, 100.0),
                (100.0, 101.0, 99.0, 100.0),
            ],
        );
        assert_eq!(fair_value_gap(&bars), None);
        assert_eq!(fair_value_gap(&bars[..2]), None);
    }

    #[test]
    fn kind_builds_matching_strategy() {
        for kind in [
            StrategyKind::GapGuardian,
            StrategyKind::Unicorn,
            StrategyKind::SilverBullet,
        ] {
            assert_eq!(kind.build().name(), kind.display_name());
        }
    }

    #[test]
    fn session_start_finds_first_bar_of_day() {
        let mut bars = bars_from("2024-03-04T15:30:00-05:00", &[(1.0, 1.0, 1.0, 1.0); 2]);
        bars.extend(bars_from(
            "2024-03-05T09:30:00-05:00",
            &[(1.0, 1.0, 1.0, 1.0); 3],
        ));
        assert_eq!(session_start(&bars), Some(2));
        assert_eq!(session_start(&bars[..2]), Some(0));
    }
}
