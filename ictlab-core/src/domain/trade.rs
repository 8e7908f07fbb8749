//! Trade: a completed round trip, and the equity points derived from trades.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Side of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }
}

/// Why a trade was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    /// Force-closed at the last bar's close because the data ran out.
    SessionEnd,
}

/// A completed round-trip trade. Never mutated after exit.
///
/// `entry_price` and `exit_price` are fill prices, slippage included.
/// `net_pnl` is after commission on both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub direction: Direction,

    // ── Entry ──
    pub entry_bar: usize,
    pub entry_time: DateTime<FixedOffset>,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_bar: usize,
    pub exit_time: DateTime<FixedOffset>,
    pub exit_price: f64,
    pub exit_reason: ExitReason,

    // ── Size and levels ──
    pub size: f64,
    pub stop_price: f64,
    pub target_price: f64,

    // ── PnL ──
    pub gross_pnl: f64,
    pub commission: f64,
    pub slippage: f64,
    pub net_pnl: f64,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }

    pub fn bars_held(&self) -> usize {
        self.exit_bar.saturating_sub(self.entry_bar)
    }
}

/// Capital after a point in time. The first point is the initial capital.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<FixedOffset>,
    pub capital: f64,
}
