//! Per-task results and ranking.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ictlab_core::domain::{EquityPoint, ParameterSet, Trade};
use ictlab_core::SimulationError;

use crate::fitness::OptimizationMetric;
use crate::metrics::MetricSet;
use crate::windows::Window;

/// Why one evaluation did not produce a usable metric set. Never fatal to a run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum TaskError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

impl From<SimulationError> for TaskError {
    fn from(err: SimulationError) -> Self {
        match err {
            SimulationError::InsufficientData { .. } => Self::InsufficientData(err.to_string()),
            SimulationError::InvalidParameter { .. } => Self::InvalidParameter(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// Ran, and traded often enough to rank.
    Completed,
    /// Too few bars or too few trades; kept, but never ranked.
    InsufficientData,
    /// Invalid parameters or an evaluation failure.
    Failed,
}

/// Outcome of one (window, parameter set) evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Index into the run's candidate list.
    pub candidate: usize,
    pub fingerprint: String,
    pub params: ParameterSet,
    /// Index into the run's window list.
    pub window_index: usize,
    pub window: Window,
    pub status: ResultStatus,
    pub metrics: MetricSet,
    pub trades: Vec<Trade>,
    pub equity: Vec<EquityPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

impl OptimizationResult {
    pub fn is_rankable(&self) -> bool {
        self.status == ResultStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == ResultStatus::Failed
    }

    pub fn score(&self, metric: OptimizationMetric) -> Option<f64> {
        metric.extract(&self.metrics)
    }
}

/// Status implied by an optional task error and the metric set.
pub fn status_for(error: Option<&TaskError>, metrics: &MetricSet) -> ResultStatus {
    match error {
        Some(TaskError::InsufficientData(_)) => ResultStatus::InsufficientData,
        Some(_) => ResultStatus::Failed,
        None if metrics.insufficient_data => ResultStatus::InsufficientData,
        None => ResultStatus::Completed,
    }
}

/// Indices of rankable results accepted by `filter`, best first.
///
/// Ties (and undefined scores) fall back to candidate index, then window
/// index, so the order never depends on completion order.
pub fn rank_results(
    results: &[OptimizationResult],
    metric: OptimizationMetric,
    filter: impl Fn(&OptimizationResult) -> bool,
) -> Vec<usize> {
    let mut ranked: Vec<usize> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_rankable() && filter(r))
        .map(|(i, _)| i)
        .collect();
    ranked.sort_by(|&a, &b| {
        let (ra, rb) = (&results[a], &results[b]);
        metric
            .rank_order(ra.score(metric), rb.score(metric))
            .then(ra.candidate.cmp(&rb.candidate))
            .then(ra.window_index.cmp(&rb.window_index))
    });
    ranked
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;

    use super::*;
    use crate::metrics::MetricsConfig;
    use crate::windows::WindowKind;

    pub fn full_window() -> Window {
        Window {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            kind: WindowKind::Full,
            roll: None,
        }
    }

    /// A completed result whose Sharpe ratio is `sharpe`.
    pub fn result_with(candidate: usize, window_index: usize, window: Window, sharpe: Option<f64>) -> OptimizationResult {
        let params = ParameterSet::new().with("p", candidate as f64);
        let metrics = MetricSet {
            sharpe_ratio: sharpe,
            trade_count: 10,
            insufficient_data: false,
            ..MetricSet::empty(&MetricsConfig::default())
        };
        OptimizationResult {
            candidate,
            fingerprint: params.fingerprint(),
            params,
            window_index,
            window,
            status: ResultStatus::Completed,
            metrics,
            trades: Vec::new(),
            equity: Vec::new(),
            error: None,
        }
    }
}
