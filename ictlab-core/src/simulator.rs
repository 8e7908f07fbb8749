//! Trade simulator: one forward pass over a bar sequence.
//!
//! Per bar:
//! 1. If a position is open (and was entered on an earlier bar), check the
//!    stop and the target against the bar's range. Stop wins when both are
//!    touched. A position closed on this bar does not re-enter on it.
//! 2. If flat, the bar is inside the strategy's active window, and it is not
//!    the final bar, ask the strategy for a signal over `bars[..=i]`.
//!
//! Anything still open after the last bar is closed at its close with
//! [`ExitReason::SessionEnd`].

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cost_model::{CostModel, Side};
use crate::domain::{names, Bar, Direction, EquityPoint, ExitReason, ParameterSet, Trade};
use crate::strategy::{Signal, StrategyEvaluator};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("insufficient data: {bars} bars supplied, at least {required} required")]
    InsufficientData { bars: usize, required: usize },

    #[error("invalid parameter {name} = {value}: must be a positive finite number")]
    InvalidParameter { name: String, value: f64 },
}

/// Account settings shared by every simulation in a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub initial_capital: f64,
    /// Percent of current capital risked per trade (0.5 = 0.5 %).
    pub risk_per_trade_percent: f64,
    /// Fewer bars than this fails with [`SimulationError::InsufficientData`].
    pub min_bars: usize,
    /// Used when a parameter set has no `stop_loss_points`.
    pub default_stop_loss_points: f64,
    /// Used when a parameter set has no `rrr`.
    pub default_rrr: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            risk_per_trade_percent: 0.5,
            min_bars: 10,
            default_stop_loss_points: 15.0,
            default_rrr: 3.0,
        }
    }
}

/// Trade ledger plus the equity curve derived from it.
///
/// The equity curve starts with the initial capital at the first bar and gets
/// one point per closed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub trades: Vec<Trade>,
    pub equity: Vec<EquityPoint>,
}

impl SimulationOutput {
    pub fn final_capital(&self) -> Option<f64> {
        self.equity.last().map(|p| p.capital)
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenPosition {
    direction: Direction,
    entry_bar: usize,
    entry_time: DateTime<FixedOffset>,
    entry_price: f64,
    size: f64,
    stop_price: f64,
    target_price: f64,
    entry_commission: f64,
    capital_at_entry: f64,
}

fn positive_param(params: &ParameterSet, name: &str, default: f64) -> Result<f64, SimulationError> {
    let value = params.get_or(name, default);
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SimulationError::InvalidParameter {
            name: name.to_string(),
            value,
        })
    }
}

/// Replay `strategy` over `bars` and return the trades it would have made.
pub fn simulate(
    bars: &[Bar],
    params: &ParameterSet,
    strategy: &dyn StrategyEvaluator,
    costs: &CostModel,
    config: &SimulationConfig,
) -> Result<SimulationOutput, SimulationError> {
    let required = config.min_bars.max(1);
    if bars.len() < required {
        return Err(SimulationError::InsufficientData {
            bars: bars.len(),
            required,
        });
    }
    let stop_points = positive_param(params, names::STOP_LOSS_POINTS, config.default_stop_loss_points)?;
    let rrr = positive_param(params, names::RRR, config.default_rrr)?;

    let last = bars.len() - 1;
    let warmup = strategy.warmup_bars();
    let mut capital = config.initial_capital;
    let mut trades = Vec::new();
    let mut equity = vec![EquityPoint {
        timestamp: bars[0].timestamp,
        capital,
    }];
    let mut open: Option<OpenPosition> = None;

    for (i, bar) in bars.iter().enumerate() {
        if let Some(pos) = open {
            if i > pos.entry_bar {
                if let Some((raw_exit, reason)) = exit_on_bar(&pos, bar) {
                    let trade = close(&pos, i, bar, raw_exit, reason, costs);
                    capital += trade.net_pnl;
                    equity.push(EquityPoint {
                        timestamp: bar.timestamp,
                        capital,
                    });
                    trades.push(trade);
                    open = None;
                }
            }
            continue;
        }

        if i == last || i + 1 < warmup || capital <= 0.0 || !strategy.is_active(bar, params) {
            continue;
        }
        let Some(signal) = strategy.evaluate(&bars[..=i], params) else {
            continue;
        };
        open = enter(i, bar, signal, stop_points, rrr, capital, costs, config);
    }

    if let Some(pos) = open {
        let bar = &bars[last];
        let trade = close(&pos, last, bar, bar.close, ExitReason::SessionEnd, costs);
        capital += trade.net_pnl;
        equity.push(EquityPoint {
            timestamp: bar.timestamp,
            capital,
        });
        trades.push(trade);
    }

    debug!(
        strategy = strategy.name(),
        bars = bars.len(),
        trades = trades.len(),
        final_capital = capital,
        "simulation finished"
    );
    Ok(SimulationOutput { trades, equity })
}

#[allow(clippy::too_many_arguments)]
fn enter(
    bar_index: usize,
    bar: &Bar,
    signal: Signal,
    stop_points: f64,
    rrr: f64,
    capital: f64,
    costs: &CostModel,
    config: &SimulationConfig,
) -> Option<OpenPosition> {
    let size = capital * config.risk_per_trade_percent / 100.0 / stop_points;
    if !(size.is_finite() && size > 0.0) {
        return None;
    }
    let sign = signal.direction.sign();
    let reference = signal.reference_price;
    let entry_price = costs.fill_price(reference, signal.direction, Side::Entry);
    Some(OpenPosition {
        direction: signal.direction,
        entry_bar: bar_index,
        entry_time: bar.timestamp,
        entry_price,
        size,
        stop_price: reference - sign * stop_points,
        target_price: reference + sign * stop_points * rrr,
        entry_commission: costs.commission_for(entry_price, size),
        capital_at_entry: capital,
    })
}

/// Raw exit level if the bar touches the stop or the target. Stop first.
fn exit_on_bar(pos: &OpenPosition, bar: &Bar) -> Option<(f64, ExitReason)> {
    let (stop_hit, target_hit) = match pos.direction {
        Direction::Long => (bar.low <= pos.stop_price, bar.high >= pos.target_price),
        Direction::Short => (bar.high >= pos.stop_price, bar.low <= pos.target_price),
    };
    if stop_hit {
        Some((pos.stop_price, ExitReason::StopLoss))
    } else if target_hit {
        Some((pos.target_price, ExitReason::TakeProfit))
    } else {
        None
    }
}

fn close(
    pos: &OpenPosition,
    exit_bar: usize,
    bar: &Bar,
    raw_exit: f64,
    exit_reason: ExitReason,
    costs: &CostModel,
) -> Trade {
    let exit_price = costs.fill_price(raw_exit, pos.direction, Side::Exit);
    let gross_pnl = (exit_price - pos.entry_price) * pos.direction.sign() * pos.size;
    let commission = pos.entry_commission + costs.commission_for(exit_price, pos.size);
    // A single trade can at most wipe out the account.
    let net_pnl = (gross_pnl - commission).max(-pos.capital_at_entry);
    Trade {
        direction: pos.direction,
        entry_bar: pos.entry_bar,
        entry_time: pos.entry_time,
        entry_price: pos.entry_price,
        exit_bar,
        exit_time: bar.timestamp,
        exit_price,
        exit_reason,
        size: pos.size,
        stop_price: pos.stop_price,
        target_price: pos.target_price,
        gross_pnl,
        commission,
        slippage: 2.0 * costs.slippage_points * pos.size,
        net_pnl,
    }
}
