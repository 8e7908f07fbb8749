//! Performance metrics: pure functions over a trade list and equity curve.
//!
//! Returns for Sharpe and Sortino are per-trade: the relative change between
//! consecutive equity points. They are annualized by `sqrt(periods_per_year)`
//! against a per-period risk-free rate of `risk_free_rate / periods_per_year`.

use serde::{Deserialize, Serialize};

use ictlab_core::domain::{EquityPoint, Trade};

/// Inputs that shape the metric definitions, not the trades themselves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub initial_capital: f64,
    /// Annual rate as a fraction (0.01 = 1 %).
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
    /// Below this many trades a metric set is flagged insufficient and the
    /// risk-adjusted ratios are undefined.
    pub min_trades: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            risk_free_rate: 0.01,
            periods_per_year: 252.0,
            min_trades: 3,
        }
    }
}

/// Metrics for one (window, parameter set) evaluation.
///
/// `profit_factor` is `+inf` when there are winners and no losers; JSON
/// output writes that as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub total_pnl: f64,
    #[serde(deserialize_with = "null_as_infinity")]
    pub profit_factor: f64,
    pub win_rate: f64,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    /// Largest peak-to-trough decline as a positive percent of the peak.
    pub max_drawdown_pct: f64,
    pub trade_count: usize,
    pub final_capital: f64,
    pub return_pct: f64,
    pub avg_trade_pnl: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub insufficient_data: bool,
}

impl MetricSet {
    pub fn compute(trades: &[Trade], equity: &[EquityPoint], config: &MetricsConfig) -> Self {
        let capital: Vec<f64> = equity.iter().map(|p| p.capital).collect();
        let trade_count = trades.len();
        let insufficient_data = trade_count == 0 || trade_count < config.min_trades;
        let total = total_pnl(trades);
        let final_capital = capital.last().copied().unwrap_or(config.initial_capital);

        let (sharpe, sortino) = if insufficient_data {
            (None, None)
        } else {
            let returns = period_returns(&capital);
            (
                sharpe_ratio(&returns, config.risk_free_rate, config.periods_per_year),
                sortino_ratio(&returns, config.risk_free_rate, config.periods_per_year),
            )
        };

        Self {
            total_pnl: total,
            profit_factor: profit_factor(trades),
            win_rate: win_rate(trades),
            sharpe_ratio: sharpe,
            sortino_ratio: sortino,
            max_drawdown_pct: max_drawdown_pct(&capital),
            trade_count,
            final_capital,
            return_pct: if config.initial_capital > 0.0 {
                (final_capital - config.initial_capital) / config.initial_capital * 100.0
            } else {
                0.0
            },
            avg_trade_pnl: if trade_count > 0 {
                total / trade_count as f64
            } else {
                0.0
            },
            gross_profit: gross_profit(trades),
            gross_loss: gross_loss(trades),
            insufficient_data,
        }
    }

    /// Metric set for an evaluation that produced no trades at all.
    pub fn empty(config: &MetricsConfig) -> Self {
        Self::compute(&[], &[], config)
    }
}

/// JSON has no infinity; `profit_factor` is written as `null` and read back here.
fn null_as_infinity<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
}

// ─── Individual metric functions ────────────────────────────────────

pub fn total_pnl(trades: &[Trade]) -> f64 {
    trades.iter().map(|t| t.net_pnl).sum()
}

pub fn gross_profit(trades: &[Trade]) -> f64 {
    trades.iter().filter(|t| t.net_pnl > 0.0).map(|t| t.net_pnl).sum()
}

/// Sum of losing trades as a positive number.
pub fn gross_loss(trades: &[Trade]) -> f64 {
    trades.iter().filter(|t| t.net_pnl < 0.0).map(|t| -t.net_pnl).sum()
}

/// Gross profit / gross loss. `+inf` with no losses and some profit, 0 with no profit.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let profit = gross_profit(trades);
    let loss = gross_loss(trades);
    if profit <= 0.0 {
        return 0.0;
    }
    if loss <= 0.0 {
        return f64::INFINITY;
    }
    profit / loss
}

/// Winners / total trades, 0 for no trades.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

/// Maximum peak-to-trough decline as a positive percent (15.0 = 15 %).
pub fn max_drawdown_pct(capital: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &c in capital {
        peak = peak.max(c);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - c) / peak * 100.0);
        }
    }
    max_dd
}

/// Relative change between consecutive capital values.
pub fn period_returns(capital: &[f64]) -> Vec<f64> {
    capital
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Annualized Sharpe. `None` with fewer than two returns or zero variance.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> Option<f64> {
    if returns.len() < 2 || periods_per_year <= 0.0 {
        return None;
    }
    let per_period_rf = risk_free_rate / periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|r| r - per_period_rf).collect();
    let std = std_dev(&excess);
    if std < 1e-15 {
        return None;
    }
    Some(mean_f64(&excess) / std * periods_per_year.sqrt())
}

/// Annualized Sortino over downside deviation. `None` when nothing fell
/// below the risk-free rate.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> Option<f64> {
    if returns.len() < 2 || periods_per_year <= 0.0 {
        return None;
    }
    let per_period_rf = risk_free_rate / periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|r| r - per_period_rf).collect();
    let downside_sq: f64 = excess.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    let downside_std = (downside_sq / excess.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return None;
    }
    Some(mean_f64(&excess) / downside_std * periods_per_year.sqrt())
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}


#[cfg(test)]
mod tests {
    use super::test_support::{equity_for, make_trade};
    use super::*;

    fn compute(pnls: &[f64]) -> MetricSet {
        let trades: Vec<Trade> = pnls.iter().map(|&p| make_trade(p)).collect();
        let equity = equity_for(&trades, 100_000.0);
        MetricSet::compute(&trades, &equity, &MetricsConfig::default())
    }

    // ── Profit factor ──

    #[test]
    fn profit_factor_all_winners_is_infinite() {
        let m = compute(&[100.0, 200.0, 50.0]);
        assert!(m.profit_factor.is_infinite() && m.profit_factor > 0.0);
    }

    #[test]
    fn profit_factor_mixed() {
        let m = compute(&[300.0, -100.0, -50.0]);
        assert!((m.profit_factor - 2.0).abs() < 1e-10);
        assert_eq!(m.gross_profit, 300.0);
        assert_eq!(m.gross_loss, 150.0);
    }

    #[test]
    fn profit_factor_no_winners_is_zero() {
        assert_eq!(compute(&[-10.0, -20.0, -5.0]).profit_factor, 0.0);
        assert_eq!(compute(&[]).profit_factor, 0.0);
    }

    // ── Win rate / insufficient data ──

    #[test]
    fn empty_trade_list_is_flagged() {
        let m = compute(&[]);
        assert_eq!(m.win_rate, 0.0);
        assert!(m.insufficient_data);
        assert_eq!(m.sharpe_ratio, None);
        assert_eq!(m.sortino_ratio, None);
        assert_eq!(m.final_capital, 100_000.0);
    }

    #[test]
    fn below_min_trades_has_no_ratios() {
        let m = compute(&[100.0, -50.0]);
        assert!(m.insufficient_data);
        assert_eq!(m.sharpe_ratio, None);
        assert_eq!(m.win_rate, 0.5);
    }

    #[test]
    fn empty_with_zero_min_trades_still_flagged() {
        let config = MetricsConfig {
            min_trades: 0,
            ..MetricsConfig::default()
        };
        assert!(MetricSet::empty(&config).insufficient_data);
    }

    // ── Totals ──

    #[test]
    fn totals_and_return() {
        let m = compute(&[1_000.0, -500.0, 1_500.0]);
        assert_eq!(m.total_pnl, 2_000.0);
        assert_eq!(m.trade_count, 3);
        assert_eq!(m.final_capital, 102_000.0);
        assert!((m.return_pct - 2.0).abs() < 1e-10);
        assert!((m.avg_trade_pnl - 2_000.0 / 3.0).abs() < 1e-10);
        assert!(!m.insufficient_data);
    }

    // ── Drawdown ──

    #[test]
    fn max_drawdown_known() {
        let dd = max_drawdown_pct(&[100_000.0, 110_000.0, 90_000.0, 95_000.0]);
        let expected = 20_000.0 / 110_000.0 * 100.0;
        assert!((dd - expected).abs() < 1e-10);
    }

    #[test]
    fn max_drawdown_monotonic_is_zero() {
        assert_eq!(max_drawdown_pct(&[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(max_drawdown_pct(&[]), 0.0);
    }

    // ── Sharpe / Sortino ──

    #[test]
    fn sharpe_constant_returns_is_undefined() {
        assert_eq!(sharpe_ratio(&[0.01; 10], 0.0, 252.0), None);
        assert_eq!(sharpe_ratio(&[0.01], 0.0, 252.0), None);
    }

    #[test]
    fn sharpe_known_value() {
        // mean 0.01, sample std of [0.0, 0.02] = sqrt(0.0002)
        let s = sharpe_ratio(&[0.0, 0.02], 0.0, 252.0).unwrap();
        let expected = 0.01 / 0.0002_f64.sqrt() * 252.0_f64.sqrt();
        assert!((s - expected).abs() < 1e-9, "got {s}, expected {expected}");
    }

    #[test]
    fn risk_free_rate_lowers_sharpe() {
        let r = [0.01, 0.02, -0.005, 0.015];
        let base = sharpe_ratio(&r, 0.0, 252.0).unwrap();
        let with_rf = sharpe_ratio(&r, 0.05, 252.0).unwrap();
        assert!(with_rf < base);
    }

    #[test]
    fn sortino_without_downside_is_undefined() {
        assert_eq!(sortino_ratio(&[0.01, 0.02, 0.03], 0.0, 252.0), None);
    }

    #[test]
    fn sortino_uses_downside_only() {
        let r = [0.02, -0.01, 0.03, -0.02];
        let s = sortino_ratio(&r, 0.0, 252.0).unwrap();
        // downside = sqrt((0.0001 + 0.0004) / 4)
        let expected = 0.005 / (0.0005_f64 / 4.0).sqrt() * 252.0_f64.sqrt();
        assert!((s - expected).abs() < 1e-9);
    }

    #[test]
    fn metrics_are_deterministic() {
        let a = compute(&[120.0, -40.0, 75.0, -10.0]);
        let b = compute(&[120.0, -40.0, 75.0, -10.0]);
        assert_eq!(a, b);
        assert!(a.sharpe_ratio.is_some());
    }
}
