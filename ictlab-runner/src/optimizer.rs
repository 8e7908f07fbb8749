//! Optimization driver.
//!
//! One run walks `Configuring -> Enumerating -> Dispatching -> Collecting ->
//! Ranking -> Done`. Only configuration problems abort a run; everything that
//! goes wrong inside a task is recorded on that task's result.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use ictlab_core::domain::{validate_series, Bar, ParameterSet};
use ictlab_core::rng::RngHierarchy;
use ictlab_core::{simulate, CostModel, SimulationConfig, StrategyEvaluator};

use crate::config::{ConfigError, RunConfig};
use crate::fitness::OptimizationMetric;
use crate::metrics::{MetricSet, MetricsConfig};
use crate::param_space::{enumerate, SearchAlgorithm};
use crate::pool::{CancelToken, Completed, PoolError, TaskExecutor, TaskPanic, WorkerPool};
use crate::result::{rank_results, status_for, OptimizationResult, ResultStatus, TaskError};
use crate::walk_forward::{summarize, WalkForwardSummary};
use crate::windows::{split, DateRange, SplitMode, Window, WindowKind};

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("worker pool: {0}")]
    Pool(#[from] PoolError),
}

// ─── Driver state ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    Configuring,
    Enumerating,
    Dispatching,
    Collecting,
    Ranking,
    Done,
    Aborted,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuring => "configuring",
            Self::Enumerating => "enumerating",
            Self::Dispatching => "dispatching",
            Self::Collecting => "collecting",
            Self::Ranking => "ranking",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Progress update sent as tasks complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
}

// ─── Report ──────────────────────────────────────────────────────────

/// Everything one optimization run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub schema_version: u32,
    pub strategy: String,
    pub metric: OptimizationMetric,
    pub algorithm: SearchAlgorithm,
    pub seed: u64,
    pub windows: Vec<Window>,
    pub candidate_count: usize,
    pub total_tasks: usize,
    pub failed_tasks: usize,
    /// Set when the run was cancelled; `results` then holds only finished tasks.
    pub cancelled: bool,
    /// Ordered by window, then candidate.
    pub results: Vec<OptimizationResult>,
    /// Indices into `results`, best first.
    pub ranked: Vec<usize>,
    pub walk_forward: Option<WalkForwardSummary>,
}

impl OptimizationReport {
    pub fn best(&self) -> Option<&OptimizationResult> {
        self.ranked.first().map(|&i| &self.results[i])
    }

    pub fn ranked_results(&self) -> impl Iterator<Item = &OptimizationResult> + '_ {
        self.ranked.iter().map(|&i| &self.results[i])
    }

    pub fn insufficient_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ResultStatus::InsufficientData)
            .count()
    }
}

// ─── Task evaluation ─────────────────────────────────────────────────

/// Shared, read-only inputs of every task in a run.
struct TaskContext<'a> {
    slices: Vec<&'a [Bar]>,
    windows: &'a [Window],
    candidates: &'a [ParameterSet],
    strategy: &'a dyn StrategyEvaluator,
    costs: &'a CostModel,
    simulation: SimulationConfig,
    metrics: MetricsConfig,
}

impl<'a> TaskContext<'a> {
    fn new(
        bars: &'a [Bar],
        windows: &'a [Window],
        candidates: &'a [ParameterSet],
        strategy: &'a dyn StrategyEvaluator,
        config: &'a RunConfig,
    ) -> Self {
        Self {
            slices: windows.iter().map(|w| w.slice(bars)).collect(),
            windows,
            candidates,
            strategy,
            costs: &config.costs,
            simulation: config.simulation_config(),
            metrics: config.metrics_config(),
        }
    }

    fn evaluate(&self, window_index: usize, candidate: usize) -> OptimizationResult {
        let params = &self.candidates[candidate];
        let outcome = simulate(
            self.slices[window_index],
            params,
            self.strategy,
            self.costs,
            &self.simulation,
        );
        let (trades, equity, error) = match outcome {
            Ok(output) => (output.trades, output.equity, None),
            Err(e) => (Vec::new(), Vec::new(), Some(TaskError::from(e))),
        };
        let metrics = MetricSet::compute(&trades, &equity, &self.metrics);
        let result = OptimizationResult {
            candidate,
            fingerprint: params.fingerprint(),
            params: params.clone(),
            window_index,
            window: self.windows[window_index],
            status: status_for(error.as_ref(), &metrics),
            metrics,
            trades,
            equity,
            error,
        };
        debug!(
            window = window_index,
            candidate,
            status = ?result.status,
            trades = result.metrics.trade_count,
            "task finished"
        );
        result
    }

    /// Result recorded for a task whose evaluation panicked.
    fn panicked(&self, window_index: usize, candidate: usize, panic: TaskPanic) -> OptimizationResult {
        let params = &self.candidates[candidate];
        warn!(window = window_index, candidate, error = %panic.0, "task panicked");
        let error = TaskError::Evaluation(panic.0);
        let metrics = MetricSet::empty(&self.metrics);
        OptimizationResult {
            candidate,
            fingerprint: params.fingerprint(),
            params: params.clone(),
            window_index,
            window: self.windows[window_index],
            status: status_for(Some(&error), &metrics),
            metrics,
            trades: Vec::new(),
            equity: Vec::new(),
            error: Some(error),
        }
    }
}

// ─── Driver ──────────────────────────────────────────────────────────

/// Drives one optimization run over a [`TaskExecutor`].
pub struct Optimizer<'a, E: TaskExecutor> {
    config: &'a RunConfig,
    executor: &'a E,
    cancel: CancelToken,
    progress: Option<&'a (dyn Fn(&Progress) + Sync)>,
    state: DriverState,
}

impl<'a, E: TaskExecutor> Optimizer<'a, E> {
    pub fn new(config: &'a RunConfig, executor: &'a E) -> Self {
        Self {
            config,
            executor,
            cancel: CancelToken::new(),
            progress: None,
            state: DriverState::Configuring,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Called from worker threads after every task.
    pub fn with_progress(mut self, progress: &'a (dyn Fn(&Progress) + Sync)) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    fn transition(&mut self, to: DriverState) {
        debug!(from = %self.state, to = %to, "driver state");
        self.state = to;
    }

    pub fn run(
        &mut self,
        bars: &[Bar],
        strategy: &dyn StrategyEvaluator,
    ) -> Result<OptimizationReport, OptimizeError> {
        self.transition(DriverState::Configuring);
        let windows = match configure(self.config, bars) {
            Ok(windows) => windows,
            Err(e) => {
                warn!(error = %e, "run aborted");
                self.transition(DriverState::Aborted);
                return Err(e.into());
            }
        };

        self.transition(DriverState::Enumerating);
        let rng = RngHierarchy::new(self.config.seed);
        let candidates = match enumerate(
            &self.config.space,
            self.config.algorithm,
            self.config.iterations,
            &rng,
        ) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "run aborted");
                self.transition(DriverState::Aborted);
                return Err(ConfigError::from(e).into());
            }
        };

        self.transition(DriverState::Dispatching);
        let tasks: Vec<(usize, usize)> = (0..windows.len())
            .flat_map(|w| (0..candidates.len()).map(move |c| (w, c)))
            .collect();
        let total = tasks.len();
        info!(
            strategy = strategy.name(),
            windows = windows.len(),
            candidates = candidates.len(),
            tasks = total,
            workers = self.executor.workers(),
            "dispatching"
        );

        let context = TaskContext::new(bars, &windows, &candidates, strategy, self.config);
        let completed = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let progress = self.progress;
        let on_complete = |outcome: &Result<OptimizationResult, TaskPanic>| {
            let is_failure = outcome.as_ref().map_or(true, OptimizationResult::is_failed);
            let failed_now = if is_failure {
                failed.fetch_add(1, Ordering::Relaxed) + 1
            } else {
                failed.load(Ordering::Relaxed)
            };
            let completed_now = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(cb) = progress {
                cb(&Progress {
                    completed: completed_now,
                    total,
                    failed: failed_now,
                });
            }
        };
        let finished = self.executor.execute(
            &tasks,
            |&(w, c)| context.evaluate(w, c),
            &self.cancel,
            &on_complete,
        );

        self.transition(DriverState::Collecting);
        let results = collect(&context, &tasks, finished);
        let failed_tasks = results.iter().filter(|r| r.is_failed()).count();
        let cancelled = self.cancel.is_cancelled() && results.len() < total;
        if cancelled {
            warn!(finished = results.len(), total, "run cancelled; ranking partial results");
        }
        if failed_tasks > 0 {
            warn!(failed = failed_tasks, total, "some tasks failed");
        }

        self.transition(DriverState::Ranking);
        let metric = self.config.metric;
        let ranked = rank_results(&results, metric, |_| true);
        let walk_forward = match self.config.split {
            SplitMode::WalkForward { .. } => Some(summarize(&results, &windows, metric)),
            SplitMode::Single => None,
        };
        if let Some(best) = ranked.first().map(|&i| &results[i]) {
            info!(
                metric = metric.display_name(),
                score = ?best.score(metric),
                params = %best.params.label(),
                "best candidate"
            );
        } else {
            info!("no rankable results");
        }

        self.transition(DriverState::Done);
        Ok(OptimizationReport {
            schema_version: SCHEMA_VERSION,
            strategy: strategy.name().to_string(),
            metric,
            algorithm: self.config.algorithm,
            seed: self.config.seed,
            candidate_count: candidates.len(),
            windows,
            total_tasks: total,
            failed_tasks,
            cancelled,
            results,
            ranked,
            walk_forward,
        })
    }
}

/// Configuring-state checks: config values, bar data, windows.
fn configure(config: &RunConfig, bars: &[Bar]) -> Result<Vec<Window>, ConfigError> {
    config.validate()?;
    if bars.is_empty() {
        return Err(ConfigError::NoBars);
    }
    validate_series(bars)?;
    let range = config
        .date_range(DateRange::covering(bars))
        .ok_or(ConfigError::NoBars)?;
    Ok(split(range, &config.split)?)
}

/// Pair every finished task with its result, ordered by window then candidate.
fn collect(
    context: &TaskContext<'_>,
    tasks: &[(usize, usize)],
    finished: Vec<Completed<OptimizationResult>>,
) -> Vec<OptimizationResult> {
    let mut results: Vec<OptimizationResult> = finished
        .into_iter()
        .map(|done| {
            let (w, c) = tasks[done.index];
            done.outcome.unwrap_or_else(|panic| context.panicked(w, c, panic))
        })
        .collect();
    results.sort_by_key(|r| (r.window_index, r.candidate));
    results
}

// ─── Entry points ────────────────────────────────────────────────────

/// Run an optimization on a worker pool sized from the configuration.
///
/// `strategy` is the evaluator that runs, and the report is named after it.
/// `config.strategy` only matters to callers that build the evaluator from it
/// with [`StrategyKind::build`](ictlab_core::StrategyKind::build).
pub fn optimize(
    config: &RunConfig,
    bars: &[Bar],
    strategy: &dyn StrategyEvaluator,
) -> Result<OptimizationReport, OptimizeError> {
    config.validate()?;
    if strategy.name() != config.strategy.display_name() {
        debug!(
            evaluator = strategy.name(),
            configured = config.strategy.display_name(),
            "evaluator differs from configured strategy"
        );
    }
    let pool = WorkerPool::new(config.worker_count())?;
    Optimizer::new(config, &pool).run(bars, strategy)
}

/// One simulation with the configured default parameters over the full range.
///
/// As with [`optimize`], `strategy` takes precedence over `config.strategy`.
pub fn backtest(
    config: &RunConfig,
    bars: &[Bar],
    strategy: &dyn StrategyEvaluator,
) -> Result<OptimizationResult, OptimizeError> {
    let windows = configure(
        &RunConfig {
            split: SplitMode::Single,
            ..config.clone()
        },
        bars,
    )?;
    debug_assert!(windows.len() == 1 && windows[0].kind == WindowKind::Full);
    let candidates = [config.default_params()];
    let context = TaskContext::new(bars, &windows, &candidates, strategy, config);
    let result = context.evaluate(0, 0);
    info!(
        strategy = strategy.name(),
        trades = result.metrics.trade_count,
        total_pnl = result.metrics.total_pnl,
        "backtest finished"
    );
    Ok(result)
}
