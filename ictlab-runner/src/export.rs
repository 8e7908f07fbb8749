//! Result export: JSON report, ranked CSV table, trade and equity CSVs.
//!
//! Persisted reports carry a `schema_version`. Unknown versions are rejected
//! on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use ictlab_core::domain::{EquityPoint, Trade};

use crate::optimizer::{OptimizationReport, SCHEMA_VERSION};
use crate::result::OptimizationResult;
use crate::walk_forward::WalkForwardSummary;

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a report to pretty JSON. Infinite profit factors become `null`.
pub fn export_json(report: &OptimizationReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize report to JSON")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<OptimizationReport> {
    let report: OptimizationReport =
        serde_json::from_str(json).context("failed to deserialize report from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Ranked results, best first, one row per (window, candidate).
pub fn export_ranked_csv(report: &OptimizationReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "rank",
        "candidate",
        "fingerprint",
        "window",
        "window_start",
        "window_end",
        "params",
        "score",
        "total_pnl",
        "profit_factor",
        "win_rate",
        "sharpe_ratio",
        "sortino_ratio",
        "max_drawdown_pct",
        "trade_count",
        "final_capital",
    ])?;

    for (rank, r) in report.ranked_results().enumerate() {
        let m = &r.metrics;
        wtr.write_record([
            &(rank + 1).to_string(),
            &r.candidate.to_string(),
            &r.fingerprint,
            &r.window.label(),
            &r.window.start.to_string(),
            &r.window.end.to_string(),
            &r.params.label(),
            &opt(r.score(report.metric)),
            &format!("{:.2}", m.total_pnl),
            &format!("{:.4}", m.profit_factor),
            &format!("{:.4}", m.win_rate),
            &opt(m.sharpe_ratio),
            &opt(m.sortino_ratio),
            &format!("{:.4}", m.max_drawdown_pct),
            &m.trade_count.to_string(),
            &format!("{:.2}", m.final_capital),
        ])?;
    }
    finish(wtr)
}

/// Trade ledger of one evaluation.
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "direction",
        "entry_bar",
        "entry_time",
        "entry_price",
        "exit_bar",
        "exit_time",
        "exit_price",
        "exit_reason",
        "bars_held",
        "size",
        "stop_price",
        "target_price",
        "gross_pnl",
        "commission",
        "slippage",
        "net_pnl",
    ])?;
    for t in trades {
        wtr.write_record([
            &format!("{:?}", t.direction),
            &t.entry_bar.to_string(),
            &t.entry_time.to_rfc3339(),
            &format!("{:.4}", t.entry_price),
            &t.exit_bar.to_string(),
            &t.exit_time.to_rfc3339(),
            &format!("{:.4}", t.exit_price),
            &format!("{:?}", t.exit_reason),
            &t.bars_held().to_string(),
            &format!("{:.6}", t.size),
            &format!("{:.4}", t.stop_price),
            &format!("{:.4}", t.target_price),
            &format!("{:.2}", t.gross_pnl),
            &format!("{:.2}", t.commission),
            &format!("{:.2}", t.slippage),
            &format!("{:.2}", t.net_pnl),
        ])?;
    }
    finish(wtr)
}

pub fn export_equity_csv(equity: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "capital"])?;
    for p in equity {
        wtr.write_record([&p.timestamp.to_rfc3339(), &format!("{:.2}", p.capital)])?;
    }
    finish(wtr)
}

/// One row per walk-forward roll.
pub fn export_walk_forward_csv(summary: &WalkForwardSummary) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "roll",
        "in_sample_start",
        "in_sample_end",
        "out_of_sample_start",
        "out_of_sample_end",
        "best_candidate",
        "params",
        "in_sample_score",
        "out_of_sample_score",
    ])?;
    for roll in &summary.rolls {
        wtr.write_record([
            &roll.roll.to_string(),
            &roll.in_sample.start.to_string(),
            &roll.in_sample.end.to_string(),
            &roll.out_of_sample.start.to_string(),
            &roll.out_of_sample.end.to_string(),
            &roll.best_candidate.map(|c| c.to_string()).unwrap_or_default(),
            &roll.params.as_ref().map(|p| p.label()).unwrap_or_default(),
            &opt(roll.in_sample_score),
            &opt(roll.out_of_sample_score),
        ])?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn run_dir(output_dir: &Path, strategy: &str) -> Result<PathBuf> {
    let slug = strategy.to_lowercase().replace(' ', "_");
    let dir = output_dir.join(format!(
        "{}_{}",
        slug,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))?;
    Ok(dir)
}

fn write(dir: &Path, name: &str, content: &str) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))
}

/// Save the artifact set for an optimization run.
///
/// Creates `{strategy}_{timestamp}/` under `output_dir` containing:
/// - `report.json`: the full report
/// - `ranked.csv`: ranked results table
/// - `best_trades.csv`, `best_equity.csv`: ledger of the top result, if any
/// - `walk_forward.csv`: roll table, walk-forward runs only
///
/// Returns the path to the created directory.
pub fn save_artifacts(report: &OptimizationReport, output_dir: &Path) -> Result<PathBuf> {
    let dir = run_dir(output_dir, &report.strategy)?;
    write(&dir, "report.json", &export_json(report)?)?;
    write(&dir, "ranked.csv", &export_ranked_csv(report)?)?;
    if let Some(best) = report.best() {
        write(&dir, "best_trades.csv", &export_trades_csv(&best.trades)?)?;
        write(&dir, "best_equity.csv", &export_equity_csv(&best.equity)?)?;
    }
    if let Some(wf) = &report.walk_forward {
        write(&dir, "walk_forward.csv", &export_walk_forward_csv(wf)?)?;
    }
    Ok(dir)
}

/// Save a single backtest: `result.json`, `trades.csv`, `equity.csv`.
pub fn save_backtest(result: &OptimizationResult, strategy: &str, output_dir: &Path) -> Result<PathBuf> {
    let dir = run_dir(output_dir, strategy)?;
    let json = serde_json::to_string_pretty(result).context("failed to serialize result to JSON")?;
    write(&dir, "result.json", &json)?;
    write(&dir, "trades.csv", &export_trades_csv(&result.trades)?)?;
    write(&dir, "equity.csv", &export_equity_csv(&result.equity)?)?;
    Ok(dir)
}

/// Load a report from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<OptimizationReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::OptimizationMetric;
    use crate::metrics::test_support::{equity_for, make_trade};
    use crate::param_space::SearchAlgorithm;
    use crate::result::rank_results;
    use crate::result::test_support::{full_window, result_with};

    fn report() -> OptimizationReport {
        let w = full_window();
        let mut results = vec![
            result_with(0, 0, w, Some(0.4)),
            result_with(1, 0, w, Some(1.1)),
            result_with(2, 0, w, None),
        ];
        let trades = vec![make_trade(250.0), make_trade(100.0)];
        results[1].equity = equity_for(&trades, 100_000.0);
        results[1].trades = trades;
        results[1].metrics.profit_factor = f64::INFINITY;
        let ranked = rank_results(&results, OptimizationMetric::SharpeRatio, |_| true);
        OptimizationReport {
            schema_version: SCHEMA_VERSION,
            strategy: "Gap Guardian".into(),
            metric: OptimizationMetric::SharpeRatio,
            algorithm: SearchAlgorithm::GridSearch,
            seed: 42,
            windows: vec![w],
            candidate_count: 3,
            total_tasks: 3,
            failed_tasks: 0,
            cancelled: false,
            results,
            ranked,
            walk_forward: None,
        }
    }

    #[test]
    fn json_roundtrip_keeps_infinite_profit_factor() {
        let original = report();
        let json = export_json(&original).unwrap();
        assert!(json.contains("\"profit_factor\": null"));
        let back = import_json(&json).unwrap();
        assert_eq!(back.results, original.results);
        assert_eq!(back.ranked, original.ranked);
        assert!(back.results[1].metrics.profit_factor.is_infinite());
    }

    #[test]
    fn future_schema_rejected() {
        let mut r = report();
        r.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&r).unwrap();
        assert!(import_json(&json).is_err());
    }

    #[test]
    fn ranked_csv_is_best_first() {
        let csv = export_ranked_csv(&report()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert!(lines[0].starts_with("rank,candidate,fingerprint"));
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("1,1,"));
        assert!(lines[2].starts_with("2,0,"));
        // Undefined Sharpe ranks last with an empty score.
        assert!(lines[3].starts_with("3,2,"));
    }

    #[test]
    fn trade_and_equity_csv_shapes() {
        let trades = vec![make_trade(10.0), make_trade(-5.0)];
        let csv = export_trades_csv(&trades).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.lines().next().unwrap().contains(",exit_reason,bars_held,size,"));
        assert!(csv.lines().nth(1).unwrap().contains(",TakeProfit,3,"));
        let eq = export_equity_csv(&equity_for(&trades, 1_000.0)).unwrap();
        assert_eq!(eq.lines().count(), 4);
        assert!(eq.lines().nth(1).unwrap().ends_with(",1000.00"));
    }

    #[test]
    fn artifacts_written_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let original = report();
        let run = save_artifacts(&original, dir.path()).unwrap();
        assert!(run.file_name().unwrap().to_string_lossy().starts_with("gap_guardian_"));
        for name in ["report.json", "ranked.csv", "best_trades.csv", "best_equity.csv"] {
            assert!(run.join(name).exists(), "{name} missing");
        }
        assert!(!run.join("walk_forward.csv").exists());
        let back = load_artifacts(&run).unwrap();
        assert_eq!(back.best().unwrap().candidate, 1);
    }

    #[test]
    fn backtest_artifacts_written() {
        let dir = tempfile::tempdir().unwrap();
        let result = &report().results[1];
        let run = save_backtest(result, "Unicorn", dir.path()).unwrap();
        assert!(run.join("result.json").exists());
        assert!(run.join("trades.csv").exists());
        assert!(run.join("equity.csv").exists());
    }
}
