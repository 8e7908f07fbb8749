//! Silver Bullet: first fair-value gap inside a fixed one-hour window.
//!
//! Each window takes at most one setup per day: once a gap has formed in the
//! window, later gaps in the same window are ignored until the next session.

use chrono::NaiveTime;

use crate::domain::{Bar, ParameterSet};

use super::{fair_value_gap, Signal, StrategyEvaluator, TimeWindow};

#[derive(Debug, Clone)]
pub struct SilverBullet {
    pub windows: Vec<TimeWindow>,
}

impl Default for SilverBullet {
    /// 03:00–04:00, 10:00–11:00 and 14:00–15:00 exchange time.
    fn default() -> Self {
        let hour = |h: u32| TimeWindow::new(hm(h), hm(h + 1));
        Self {
            windows: vec![hour(3), hour(10), hour(14)],
        }
    }
}

fn hm(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
}

impl SilverBullet {
    fn window_for(&self, bar: &Bar) -> Option<&TimeWindow> {
        let t = bar.local_time();
        self.windows.iter().find(|w| w.contains(t))
    }
}

impl StrategyEvaluator for SilverBullet {
    fn name(&self) -> &str {
        "Silver Bullet"
    }

    fn warmup_bars(&self) -> usize {
        3
    }

    fn is_active(&self, bar: &Bar, _params: &ParameterSet) -> bool {
        self.window_for(bar).is_some()
    }

    fn evaluate(&self, history: &[Bar], _params: &ParameterSet) -> Option<Signal> {
        let current = history.last()?;
        let window = self.window_for(current)?;
        let direction = fair_value_gap(history)?;

        let day = current.session_date();
        let end = history.len() - 1;
        let earlier_gap = (2..end).rev().any(|i| {
            let bar = &history[i];
            bar.session_date() == day
                && window.contains(bar.local_time())
                && fair_value_gap(&history[..=i]).is_some()
        });
        if earlier_gap {
            return None;
        }

        Some(Signal {
            direction,
            reference_price: current.close,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;
    use crate::strategy::test_bars::bars_from;

    #[test]
    fn default_windows() {
        let sb = SilverBullet::default();
        assert_eq!(sb.windows.len(), 3);
        let at = |s: &str| bars_from(s, &[(1.0, 1.0, 1.0, 1.0)]).remove(0);
        assert!(sb.is_active(&at("2024-03-04T03:15:00-05:00"), &ParameterSet::new()));
        assert!(sb.is_active(&at("2024-03-04T10:45:00-05:00"), &ParameterSet::new()));
        assert!(!sb.is_active(&at("2024-03-04T11:00:00-05:00"), &ParameterSet::new()));
        assert!(!sb.is_active(&at("2024-03-04T12:00:00-05:00"), &ParameterSet::new()));
    }

    #[test]
    fn first_gap_in_window_signals() {
        let bars = bars_from(
            "2024-03-04T09:45:00-05:00",
            &[
                (100.0, 101.0, 99.0, 100.5),
                (100.5, 104.0, 100.5, 103.5),
                (103.5, 105.0, 102.0, 104.5),
            ],
        );
        let signal = SilverBullet::default()
            .evaluate(&bars, &ParameterSet::new())
            .unwrap();
        assert_eq!(signal.direction, Direction::Long);
        assert_eq!(signal.reference_price, 104.5);
    }

    #[test]
    fn later_gap_in_same_window_ignored() {
        let bars = bars_from(
            "2024-03-04T09:45:00-05:00",
            &[
                (100.0, 101.0, 99.0, 100.5),
                (100.5, 104.0, 100.5, 103.5),
                (103.5, 105.0, 102.0, 104.5),
                (104.5, 106.0, 104.0, 105.5),
                (105.5, 108.0, 106.5, 107.5),
            ],
        );
        let sb = SilverBullet::default();
        assert!(sb.evaluate(&bars[..3], &ParameterSet::new()).is_some());
        assert!(fair_value_gap(&bars).is_some());
        assert!(sb.evaluate(&bars, &ParameterSet::new()).is_none());
    }

    #[test]
    fn gap_outside_window_ignored() {
        let bars = bars_from(
            "2024-03-04T12:00:00-05:00",
            &[
                (100.0, 101.0, 99.0, 100.5),
                (100.5, 104.0, 100.5, 103.5),
                (103.5, 105.0, 102.0, 104.5),
            ],
        );
        assert!(SilverBullet::default()
            .evaluate(&bars, &ParameterSet::new())
            .is_none());
    }
}
