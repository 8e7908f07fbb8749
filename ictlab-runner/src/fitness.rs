//! Optimization metric: which MetricSet field ranks the candidates.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::metrics::MetricSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMetric {
    TotalPnl,
    ProfitFactor,
    WinRate,
    #[default]
    SharpeRatio,
    SortinoRatio,
    MaxDrawdownPct,
}

impl OptimizationMetric {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::TotalPnl => "Total P&L",
            Self::ProfitFactor => "Profit Factor",
            Self::WinRate => "Win Rate",
            Self::SharpeRatio => "Sharpe Ratio",
            Self::SortinoRatio => "Sortino Ratio",
            Self::MaxDrawdownPct => "Max Drawdown %",
        }
    }

    /// The metric's value, `None` when it is undefined for this set.
    pub fn extract(self, metrics: &MetricSet) -> Option<f64> {
        let value = match self {
            Self::TotalPnl => metrics.total_pnl,
            Self::ProfitFactor => metrics.profit_factor,
            Self::WinRate => metrics.win_rate,
            Self::SharpeRatio => return metrics.sharpe_ratio,
            Self::SortinoRatio => return metrics.sortino_ratio,
            Self::MaxDrawdownPct => metrics.max_drawdown_pct,
        };
        (!value.is_nan()).then_some(value)
    }

    /// Max drawdown ranks ascending; everything else descending.
    pub fn is_higher_better(self) -> bool {
        !matches!(self, Self::MaxDrawdownPct)
    }

    /// Ranking order: `Less` means `a` ranks ahead of `b`. Undefined values rank last.
    pub fn rank_order(self, a: Option<f64>, b: Option<f64>) -> Ordering {
        match (a, b) {
            (Some(x), Some(y)) => {
                let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
                if self.is_higher_better() {
                    ord.reverse()
                } else {
                    ord
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsConfig;

    fn sample_metrics() -> MetricSet {
        MetricSet {
            total_pnl: 1_500.0,
            profit_factor: 1.8,
            win_rate: 0.55,
            sharpe_ratio: Some(1.5),
            sortino_ratio: None,
            max_drawdown_pct: 10.0,
            trade_count: 20,
            ..MetricSet::empty(&MetricsConfig::default())
        }
    }

    #[test]
    fn extract_sharpe() {
        assert_eq!(OptimizationMetric::SharpeRatio.extract(&sample_metrics()), Some(1.5));
    }

    #[test]
    fn extract_undefined_sortino() {
        assert_eq!(OptimizationMetric::SortinoRatio.extract(&sample_metrics()), None);
    }

    #[test]
    fn default_is_sharpe() {
        assert_eq!(OptimizationMetric::default(), OptimizationMetric::SharpeRatio);
    }

    #[test]
    fn higher_is_better_except_drawdown() {
        let pnl = OptimizationMetric::TotalPnl;
        assert_eq!(pnl.rank_order(Some(2.0), Some(1.5)), Ordering::Less);
        assert_eq!(pnl.rank_order(Some(1.0), Some(1.5)), Ordering::Greater);
        let dd = OptimizationMetric::MaxDrawdownPct;
        assert_eq!(dd.rank_order(Some(5.0), Some(20.0)), Ordering::Less);
        assert_eq!(dd.rank_order(Some(20.0), Some(5.0)), Ordering::Greater);
    }

    #[test]
    fn infinite_profit_factor_ranks_first() {
        assert_eq!(
            OptimizationMetric::ProfitFactor.rank_order(Some(f64::INFINITY), Some(50.0)),
            Ordering::Less
        );
    }

    #[test]
    fn undefined_ranks_last() {
        let m = OptimizationMetric::SharpeRatio;
        assert_eq!(m.rank_order(Some(-3.0), None), Ordering::Less);
        assert_eq!(m.rank_order(None, Some(-3.0)), Ordering::Greater);
        let dd = OptimizationMetric::MaxDrawdownPct;
        assert_eq!(dd.rank_order(Some(90.0), None), Ordering::Less);
    }

    #[test]
    fn serde_names() {
        let json = serde_json::to_string(&OptimizationMetric::MaxDrawdownPct).unwrap();
        assert_eq!(json, "\"max_drawdown_pct\"");
    }
}
