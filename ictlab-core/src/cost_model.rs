//! Cost model: slippage and commission per side.
//!
//! Slippage is directional and measured in price points: buyers pay more,
//! sellers receive less. Commission is charged independently on the entry
//! fill and on the exit fill, so a round trip pays it twice.

use serde::{Deserialize, Serialize};

use crate::domain::Direction;

/// Commission schedule, applied once per side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Commission {
    #[default]
    None,
    /// Flat amount per fill.
    FixedPerTrade {
        #[serde(default = "default_fixed_amount")]
        amount: f64,
    },
    /// Fraction of traded value per fill (0.001 = 0.1 %).
    PercentageOfValue {
        #[serde(default = "default_percentage_rate")]
        rate: f64,
    },
}

fn default_fixed_amount() -> f64 {
    1.0
}

fn default_percentage_rate() -> f64 {
    0.001
}

/// Execution friction for the simulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    #[serde(default)]
    pub commission: Commission,
    /// Adverse price adjustment per side, in price points.
    #[serde(default)]
    pub slippage_points: f64,
}

/// Which leg of the round trip a fill belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Entry,
    Exit,
}

impl CostModel {
    pub fn new(commission: Commission, slippage_points: f64) -> Self {
        Self {
            commission,
            slippage_points,
        }
    }

    pub fn frictionless() -> Self {
        Self::default()
    }

    /// Fill price after slippage for one leg of a position.
    ///
    /// A long entry and a short exit are buys (price moves up); a long exit
    /// and a short entry are sells (price moves down).
    pub fn fill_price(&self, raw_price: f64, direction: Direction, side: Side) -> f64 {
        let buy = matches!(
            (direction, side),
            (Direction::Long, Side::Entry) | (Direction::Short, Side::Exit)
        );
        if buy {
            raw_price + self.slippage_points
        } else {
            raw_price - self.slippage_points
        }
    }

    /// Commission owed on one fill.
    pub fn commission_for(&self, fill_price: f64, size: f64) -> f64 {
        match self.commission {
            Commission::None => 0.0,
            Commission::FixedPerTrade { amount } => amount,
            Commission::PercentageOfValue { rate } => (fill_price * size).abs() * rate,
        }
    }

    /// Negative slippage or commission values are rejected by configuration.
    pub fn is_valid(&self) -> bool {
        let commission_ok = match self.commission {
            Commission::None => true,
            Commission::FixedPerTrade { amount } => amount.is_finite() && amount >= 0.0,
            Commission::PercentageOfValue { rate } => rate.is_finite() && rate >= 0.0,
        };
        commission_ok && self.slippage_points.is_finite() && self.slippage_points >= 0.0
    }
}
