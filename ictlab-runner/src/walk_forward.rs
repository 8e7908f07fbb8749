//! Walk-forward roll analysis.
//!
//! For each roll, the candidate ranked best on the in-sample window is looked
//! up on the paired out-of-sample window. The spread between mean in-sample
//! and mean out-of-sample scores is the degradation ratio, a direct read on
//! overfitting.

use serde::{Deserialize, Serialize};

use ictlab_core::domain::ParameterSet;

use crate::fitness::OptimizationMetric;
use crate::result::{rank_results, OptimizationResult};
use crate::windows::{Window, WindowKind};

// ─── Result types ────────────────────────────────────────────────────

/// Best in-sample candidate of one roll and how it fared out of sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollSummary {
    pub roll: usize,
    pub in_sample: Window,
    pub out_of_sample: Window,
    /// `None` when no candidate was rankable in sample.
    pub best_candidate: Option<usize>,
    pub params: Option<ParameterSet>,
    pub in_sample_score: Option<f64>,
    pub out_of_sample_score: Option<f64>,
    /// Indices into the report's result list.
    pub in_sample_result: Option<usize>,
    pub out_of_sample_result: Option<usize>,
}

/// How the degradation ratio was computed (or why it wasn't).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationFlag {
    /// Mean IS >= 0.1, ratio = OOS / IS.
    Normal,
    /// Mean IS in [0, 0.1): difference OOS - IS instead of a ratio.
    LowInSample,
    /// Mean IS negative, ratio skipped.
    NegativeInSample,
    /// Positive IS but negative OOS, clamped to 0.0.
    FailedOutOfSample,
    /// No roll produced both an IS and an OOS score.
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardSummary {
    pub metric: OptimizationMetric,
    pub rolls: Vec<RollSummary>,
    /// Rolls that contributed to the means.
    pub scored_rolls: usize,
    pub mean_in_sample: Option<f64>,
    pub mean_out_of_sample: Option<f64>,
    pub degradation_ratio: Option<f64>,
    pub degradation_flag: DegradationFlag,
}

// ─── Roll analysis ───────────────────────────────────────────────────

/// Per-roll best in-sample candidate, applied to the paired out-of-sample window.
///
/// `windows` is the list the results' `window_index` refers to.
pub fn best_per_roll(
    results: &[OptimizationResult],
    windows: &[Window],
    metric: OptimizationMetric,
) -> Vec<RollSummary> {
    let mut rolls = Vec::new();
    for (is_index, is_window) in windows.iter().enumerate() {
        let (WindowKind::InSample, Some(roll)) = (is_window.kind, is_window.roll) else {
            continue;
        };
        let Some((oos_index, oos_window)) = windows
            .iter()
            .enumerate()
            .find(|(_, w)| w.kind == WindowKind::OutOfSample && w.roll == Some(roll))
        else {
            continue;
        };

        let best = rank_results(results, metric, |r| r.window_index == is_index)
            .first()
            .copied();
        let oos = best.and_then(|b| {
            results
                .iter()
                .position(|r| r.window_index == oos_index && r.candidate == results[b].candidate)
        });

        rolls.push(RollSummary {
            roll,
            in_sample: *is_window,
            out_of_sample: *oos_window,
            best_candidate: best.map(|b| results[b].candidate),
            params: best.map(|b| results[b].params.clone()),
            in_sample_score: best.and_then(|b| results[b].score(metric)),
            out_of_sample_score: oos
                .filter(|&o| results[o].is_rankable())
                .and_then(|o| results[o].score(metric)),
            in_sample_result: best,
            out_of_sample_result: oos,
        });
    }
    rolls
}

/// Roll table plus means and degradation across rolls.
pub fn summarize(
    results: &[OptimizationResult],
    windows: &[Window],
    metric: OptimizationMetric,
) -> WalkForwardSummary {
    let rolls = best_per_roll(results, windows, metric);
    let scored: Vec<(f64, f64)> = rolls
        .iter()
        .filter_map(|r| Some((r.in_sample_score?, r.out_of_sample_score?)))
        .collect();

    let (mean_in_sample, mean_out_of_sample, degradation_ratio, degradation_flag) = if scored.is_empty() {
        (None, None, None, DegradationFlag::InsufficientData)
    } else {
        let n = scored.len() as f64;
        let mean_is = scored.iter().map(|(is, _)| is).sum::<f64>() / n;
        let mean_oos = scored.iter().map(|(_, oos)| oos).sum::<f64>() / n;
        let (ratio, flag) = compute_degradation_ratio(mean_is, mean_oos);
        (Some(mean_is), Some(mean_oos), ratio, flag)
    };

    WalkForwardSummary {
        metric,
        scored_rolls: scored.len(),
        rolls,
        mean_in_sample,
        mean_out_of_sample,
        degradation_ratio,
        degradation_flag,
    }
}

/// Degradation of the out-of-sample mean against the in-sample mean.
///
/// - IS < 0: skipped (NegativeInSample)
/// - 0 <= IS < 0.1: OOS - IS (LowInSample)
/// - IS >= 0.1, OOS < 0: 0.0 (FailedOutOfSample)
/// - otherwise OOS / IS (Normal)
pub fn compute_degradation_ratio(mean_is: f64, mean_oos: f64) -> (Option<f64>, DegradationFlag) {
    if mean_is < 0.0 {
        (None, DegradationFlag::NegativeInSample)
    } else if mean_is < 0.1 {
        (Some(mean_oos - mean_is), DegradationFlag::LowInSample)
    } else if mean_oos < 0.0 {
        (Some(0.0), DegradationFlag::FailedOutOfSample)
    } else {
        (Some(mean_oos / mean_is), DegradationFlag::Normal)
    }
}
