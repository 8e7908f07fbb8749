//! Run configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration:
//! Gap Guardian, grid search over the reference space, Sharpe ranking,
//! single full-range window.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ictlab_core::domain::{names, BarError, ParameterSet};
use ictlab_core::{CostModel, SimulationConfig, StrategyKind};

use crate::fitness::OptimizationMetric;
use crate::metrics::MetricsConfig;
use crate::param_space::{ParamSpec, SearchAlgorithm, SpaceError};
use crate::pool::default_workers;
use crate::windows::{DateRange, SplitMode, WindowError};

/// Problems that stop a run before any task is dispatched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("parameter space: {0}")]
    Space(#[from] SpaceError),

    #[error("windows: {0}")]
    Window(#[from] WindowError),

    #[error("bar data: {0}")]
    Bars(#[from] BarError),

    #[error("no bars to evaluate")]
    NoBars,
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub strategy: StrategyKind,
    pub algorithm: SearchAlgorithm,
    pub metric: OptimizationMetric,
    /// Random search draws.
    pub iterations: usize,
    /// Master seed for the RNG hierarchy.
    pub seed: u64,
    /// `None` means available cores minus one.
    pub workers: Option<usize>,
    /// Restricts evaluation to `[start_date, end_date)`; defaults to the bar range.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub split: SplitMode,
    pub account: AccountConfig,
    pub costs: CostModel,
    pub metrics: MetricsSection,
    pub space: ParamSpec,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::GapGuardian,
            algorithm: SearchAlgorithm::GridSearch,
            metric: OptimizationMetric::SharpeRatio,
            iterations: 25,
            seed: 42,
            workers: None,
            start_date: None,
            end_date: None,
            split: SplitMode::Single,
            account: AccountConfig::default(),
            costs: CostModel::default(),
            metrics: MetricsSection::default(),
            space: ParamSpec::gap_guardian_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccountConfig {
    pub initial_capital: f64,
    pub risk_per_trade_percent: f64,
    pub min_bars: usize,
    pub stop_loss_points: f64,
    pub rrr: f64,
}

impl Default for AccountConfig {
    fn default() -> Self {
        let sim = SimulationConfig::default();
        Self {
            initial_capital: sim.initial_capital,
            risk_per_trade_percent: sim.risk_per_trade_percent,
            min_bars: sim.min_bars,
            stop_loss_points: sim.default_stop_loss_points,
            rrr: sim.default_rrr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsSection {
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
    pub min_trades: usize,
}

impl Default for MetricsSection {
    fn default() -> Self {
        let m = MetricsConfig::default();
        Self {
            risk_free_rate: m.risk_free_rate,
            periods_per_year: m.periods_per_year,
            min_trades: m.min_trades,
        }
    }
}

impl RunConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            initial_capital: self.account.initial_capital,
            risk_per_trade_percent: self.account.risk_per_trade_percent,
            min_bars: self.account.min_bars,
            default_stop_loss_points: self.account.stop_loss_points,
            default_rrr: self.account.rrr,
        }
    }

    pub fn metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            initial_capital: self.account.initial_capital,
            risk_free_rate: self.metrics.risk_free_rate,
            periods_per_year: self.metrics.periods_per_year,
            min_trades: self.metrics.min_trades,
        }
    }

    /// Parameters for a single backtest: the account's stop and RRR, strategy defaults otherwise.
    pub fn default_params(&self) -> ParameterSet {
        ParameterSet::new()
            .with(names::STOP_LOSS_POINTS, self.account.stop_loss_points)
            .with(names::RRR, self.account.rrr)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_workers)
    }

    /// Evaluation range: explicit dates where given, bar coverage otherwise.
    pub fn date_range(&self, available: Option<DateRange>) -> Option<DateRange> {
        let start = self.start_date.or(available.map(|r| r.start))?;
        let end = self.end_date.or(available.map(|r| r.end))?;
        Some(DateRange::new(start, end))
    }

    /// Checks that do not depend on the bar data. Nothing is clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.account;
        if !(a.initial_capital.is_finite() && a.initial_capital > 0.0) {
            return Err(ConfigError::invalid("account.initial_capital", "must be positive"));
        }
        if !(a.risk_per_trade_percent > 0.0 && a.risk_per_trade_percent <= 100.0) {
            return Err(ConfigError::invalid(
                "account.risk_per_trade_percent",
                "must be in (0, 100]",
            ));
        }
        if a.min_bars == 0 {
            return Err(ConfigError::invalid("account.min_bars", "must be at least 1"));
        }
        if !self.costs.is_valid() {
            return Err(ConfigError::invalid(
                "costs",
                "slippage and commission must be finite and non-negative",
            ));
        }
        if self.workers == Some(0) {
            return Err(ConfigError::invalid("workers", "must be at least 1"));
        }
        if !(self.metrics.periods_per_year.is_finite() && self.metrics.periods_per_year > 0.0) {
            return Err(ConfigError::invalid("metrics.periods_per_year", "must be positive"));
        }
        if !self.metrics.risk_free_rate.is_finite() {
            return Err(ConfigError::invalid("metrics.risk_free_rate", "must be finite"));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end <= start {
                return Err(WindowError::EmptyRange { start, end }.into());
            }
        }
        self.space.validate()?;
        if self.algorithm == SearchAlgorithm::RandomSearch && self.iterations == 0 {
            return Err(SpaceError::ZeroIterations.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param_space::{ParamDef, ParamDomain};
    use ictlab_core::Commission;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = RunConfig::from_toml("").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.account.initial_capital, 100_000.0);
        assert_eq!(config.account.risk_per_trade_percent, 0.5);
        assert_eq!(config.iterations, 25);
        assert_eq!(config.metrics.min_trades, 3);
        assert_eq!(config.space.params.len(), 6);
        config.validate().unwrap();
    }

    #[test]
    fn parses_full_file() {
        let toml = r#"
strategy = "silver_bullet"
algorithm = "random_search"
metric = "max_drawdown_pct"
iterations = 10
seed = 7
workers = 2
start_date = "2024-01-01"
end_date = "2024-07-01"

[split]
mode = "walk_forward"
in_sample_days = 90
out_of_sample_days = 30
step_days = 30

[account]
initial_capital = 50000.0
risk_per_trade_percent = 1.0

[costs]
slippage_points = 0.25

[costs.commission]
type = "fixed_per_trade"
amount = 1.0

[metrics]
min_trades = 5

[[space]]
name = "stop_loss_points"
min = 5
max = 50
steps = 5

[[space]]
name = "entry_end_minute"
values = [0, 30]
"#;
        let config = RunConfig::from_toml(toml).unwrap();
        assert_eq!(config.strategy, StrategyKind::SilverBullet);
        assert_eq!(config.algorithm, SearchAlgorithm::RandomSearch);
        assert_eq!(config.metric, OptimizationMetric::MaxDrawdownPct);
        assert_eq!(config.worker_count(), 2);
        assert_eq!(
            config.split,
            SplitMode::WalkForward {
                in_sample_days: 90,
                out_of_sample_days: 30,
                step_days: 30
            }
        );
        assert_eq!(config.account.initial_capital, 50_000.0);
        assert_eq!(config.account.min_bars, 10);
        assert_eq!(config.costs.commission, Commission::FixedPerTrade { amount: 1.0 });
        assert_eq!(config.metrics.min_trades, 5);
        assert_eq!(config.metrics.risk_free_rate, 0.01);
        assert_eq!(
            config.space.params,
            vec![
                ParamDef::new("stop_loss_points", ParamDomain::range(5.0, 50.0, 5)),
                ParamDef::new("entry_end_minute", ParamDomain::values([0.0, 30.0])),
            ]
        );
        config.validate().unwrap();
    }

    #[test]
    fn commission_type_alone_uses_default_value() {
        let fixed = RunConfig::from_toml("[costs.commission]\ntype = \"fixed_per_trade\"").unwrap();
        assert_eq!(fixed.costs.commission, Commission::FixedPerTrade { amount: 1.0 });
        let pct = RunConfig::from_toml("[costs.commission]\ntype = \"percentage_of_value\"").unwrap();
        assert_eq!(pct.costs.commission, Commission::PercentageOfValue { rate: 0.001 });
        pct.validate().unwrap();
    }

    #[test]
    fn integer_range_collapse_is_config_error() {
        let toml = r#"
[[space]]
name = "entry_start_hour"
min = 8
max = 10
steps = 5
integer = true
"#;
        let config = RunConfig::from_toml(toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Space(SpaceError::TooFewIntegers { distinct: 3, .. }))
        ));
    }

    #[test]
    fn unknown_field_rejected() {
        assert!(matches!(
            RunConfig::from_toml("iteratoins = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut c = RunConfig::default();
        c.account.initial_capital = 0.0;
        assert!(c.validate().is_err());

        let mut c = RunConfig::default();
        c.account.risk_per_trade_percent = 150.0;
        assert!(c.validate().is_err());

        let mut c = RunConfig::default();
        c.workers = Some(0);
        assert!(c.validate().is_err());

        let mut c = RunConfig::default();
        c.costs.slippage_points = -0.5;
        assert!(c.validate().is_err());

        let mut c = RunConfig::default();
        c.algorithm = SearchAlgorithm::RandomSearch;
        c.iterations = 0;
        assert!(matches!(c.validate(), Err(ConfigError::Space(SpaceError::ZeroIterations))));

        let mut c = RunConfig::default();
        c.space = ParamSpec::default();
        assert!(matches!(c.validate(), Err(ConfigError::Space(SpaceError::Empty))));

        let mut c = RunConfig::default();
        c.start_date = NaiveDate::from_ymd_opt(2024, 2, 1);
        c.end_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        assert!(matches!(c.validate(), Err(ConfigError::Window(_))));
    }

    #[test]
    fn date_range_prefers_explicit_dates() {
        let mut c = RunConfig::default();
        let bars = DateRange::new(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        assert_eq!(c.date_range(Some(bars)), Some(bars));
        c.start_date = NaiveDate::from_ymd_opt(2023, 6, 1);
        assert_eq!(c.date_range(Some(bars)).unwrap().start, c.start_date.unwrap());
        assert_eq!(RunConfig::default().date_range(None), None);
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let config = RunConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(RunConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn default_params_carry_account_stop_and_rrr() {
        let params = RunConfig::default().default_params();
        assert_eq!(params.get(names::STOP_LOSS_POINTS), Some(15.0));
        assert_eq!(params.get(names::RRR), Some(3.0));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = RunConfig::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
