//! ICT Lab Runner: optimization and evaluation engine.
//!
//! This crate builds on `ictlab-core` to provide:
//! - Metrics over a trade ledger (P&L, profit factor, Sharpe, Sortino, drawdown)
//! - Window splitting for single and walk-forward runs
//! - Parameter space enumeration (grid and seeded random search)
//! - A parallel task pool with panic isolation and cooperative cancellation
//! - The optimization driver, ranking and walk-forward roll analysis
//! - TOML run configuration, CSV bar loading, result export, logging setup

pub mod config;
pub mod data_loader;
pub mod export;
pub mod fitness;
pub mod logging;
pub mod metrics;
pub mod optimizer;
pub mod param_space;
pub mod pool;
pub mod result;
pub mod walk_forward;
pub mod windows;

pub use config::{ConfigError, RunConfig};
pub use data_loader::{dataset_hash, load_bars_csv, LoadError};
pub use fitness::OptimizationMetric;
pub use logging::{init_logging, LogFormat};
pub use metrics::{MetricSet, MetricsConfig};
pub use optimizer::{
    backtest, optimize, DriverState, OptimizationReport, OptimizeError, Optimizer, Progress,
};
pub use param_space::{enumerate, ParamDef, ParamDomain, ParamSpec, SearchAlgorithm, SpaceError};
pub use pool::{CancelToken, InlineExecutor, PoolError, TaskExecutor, WorkerPool};
pub use result::{rank_results, OptimizationResult, ResultStatus, TaskError};
pub use walk_forward::{DegradationFlag, RollSummary, WalkForwardSummary};
pub use windows::{split, DateRange, SplitMode, Window, WindowError, WindowKind};
