//! ICT Lab CLI: optimize and backtest commands.
//!
//! Commands:
//! - `optimize`: search the configured parameter space and rank the results
//! - `backtest`: one simulation with the configured default parameters
//!
//! Ctrl-C during `optimize` stops dispatching new tasks. Tasks already running
//! finish, and the partial results are ranked, printed and saved.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{warn, Level};

use ictlab_core::domain::Bar;
use ictlab_runner::export::{save_artifacts, save_backtest};
use ictlab_runner::{
    backtest, dataset_hash, init_logging, load_bars_csv, CancelToken, LogFormat,
    OptimizationReport, OptimizationResult, Optimizer, Progress, RunConfig, WorkerPool,
};

#[derive(Parser)]
#[command(name = "ictlab", about = "ICT Lab CLI: intraday strategy optimizer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log output format: pretty, json or compact.
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    /// Default log level; RUST_LOG overrides it.
    #[arg(long, global = true, default_value = "info")]
    log_level: Level,
}

#[derive(Args)]
struct RunArgs {
    /// Path to a TOML run configuration. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV bar file: timestamp,open,high,low,close,volume.
    #[arg(long)]
    bars: PathBuf,

    /// Output directory for artifacts.
    #[arg(long, default_value = "results")]
    output: PathBuf,

    /// Print the summary only; write no artifacts.
    #[arg(long, default_value_t = false)]
    no_save: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the parameter space and rank the candidates.
    Optimize(RunArgs),
    /// Run a single backtest with the configured default parameters.
    Backtest(RunArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level).context("failed to initialize logging")?;

    match cli.command {
        Commands::Optimize(args) => run_optimize(&args),
        Commands::Backtest(args) => run_backtest(&args),
    }
}

fn load_inputs(args: &RunArgs) -> Result<(RunConfig, Vec<Bar>)> {
    let config = match &args.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RunConfig::default(),
    };
    let bars = load_bars_csv(&args.bars)
        .with_context(|| format!("failed to load bars from {}", args.bars.display()))?;
    Ok((config, bars))
}

fn run_optimize(args: &RunArgs) -> Result<()> {
    let (config, bars) = load_inputs(args)?;
    config.validate()?;
    let strategy = config.strategy.build();
    let pool = WorkerPool::new(config.worker_count())?;

    let last_print = Mutex::new(Instant::now());
    let on_progress = |p: &Progress| {
        let Ok(mut last) = last_print.lock() else {
            return;
        };
        if last.elapsed().as_millis() >= 500 || p.completed == p.total {
            eprint!("\r{}/{} tasks ({} failed)", p.completed, p.total, p.failed);
            *last = Instant::now();
        }
    };

    let mut optimizer = Optimizer::new(&config, &pool).with_progress(&on_progress);
    cancel_on_ctrl_c(optimizer.cancel_token())?;
    let report = optimizer.run(&bars, &strategy)?;
    eprintln!();

    print_report(&report, &dataset_hash(&bars));
    save(args, |dir| save_artifacts(&report, dir))
}

/// Cancel the run on the first Ctrl-C. The watcher thread outlives the run.
fn cancel_on_ctrl_c(token: CancelToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start signal runtime")?;
    std::thread::spawn(move || {
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; finishing in-flight tasks");
                token.cancel();
            }
        });
    });
    Ok(())
}

fn run_backtest(args: &RunArgs) -> Result<()> {
    let (config, bars) = load_inputs(args)?;
    let strategy = config.strategy.build();
    let result = backtest(&config, &bars, &strategy)?;

    print_backtest(config.strategy.display_name(), &result, &dataset_hash(&bars));
    save(args, |dir| save_backtest(&result, config.strategy.display_name(), dir))
}

fn save(args: &RunArgs, write: impl FnOnce(&Path) -> Result<PathBuf>) -> Result<()> {
    if args.no_save {
        return Ok(());
    }
    let run_dir = write(&args.output)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.3}"))
}

fn print_metrics(result: &OptimizationResult) {
    let m = &result.metrics;
    println!("Trades:         {}", m.trade_count);
    println!("Total P&L:      {:.2}", m.total_pnl);
    println!("Return:         {:.2}%", m.return_pct);
    println!("Sharpe:         {}", fmt_opt(m.sharpe_ratio));
    println!("Sortino:        {}", fmt_opt(m.sortino_ratio));
    println!("Max Drawdown:   {:.2}%", m.max_drawdown_pct);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    if m.insufficient_data {
        println!("WARNING: too few trades for risk-adjusted metrics");
    }
}

fn print_report(report: &OptimizationReport, data_hash: &str) {
    println!();
    println!("=== Optimization Result ===");
    println!("Strategy:       {}", report.strategy);
    println!("Algorithm:      {:?}", report.algorithm);
    println!("Metric:         {}", report.metric.display_name());
    println!("Dataset:        {}", &data_hash[..16]);
    println!("Windows:        {}", report.windows.len());
    println!("Candidates:     {}", report.candidate_count);
    println!(
        "Tasks:          {} of {} ({} failed, {} insufficient)",
        report.results.len(),
        report.total_tasks,
        report.failed_tasks,
        report.insufficient_count()
    );
    if report.cancelled {
        println!("WARNING: run was cancelled; results are partial");
    }

    match report.best() {
        Some(best) => {
            println!();
            println!("--- Best Candidate ({}) ---", best.window.label());
            println!("Params:         {}", best.params.label());
            println!("Fingerprint:    {}", best.fingerprint);
            print_metrics(best);
        }
        None => {
            println!();
            println!("No candidate produced enough trades to rank.");
        }
    }

    if let Some(wf) = &report.walk_forward {
        println!();
        println!("--- Walk-Forward ---");
        for roll in &wf.rolls {
            println!(
                "Roll {:>2}: IS {} OOS {}  {}",
                roll.roll,
                fmt_opt(roll.in_sample_score),
                fmt_opt(roll.out_of_sample_score),
                roll.params.as_ref().map(|p| p.label()).unwrap_or_default()
            );
        }
        println!("Mean IS:        {}", fmt_opt(wf.mean_in_sample));
        println!("Mean OOS:       {}", fmt_opt(wf.mean_out_of_sample));
        println!(
            "Degradation:    {} ({:?})",
            fmt_opt(wf.degradation_ratio),
            wf.degradation_flag
        );
    }
}

fn print_backtest(strategy: &str, result: &OptimizationResult, data_hash: &str) {
    println!();
    println!("=== Backtest Result ===");
    println!("Strategy:       {strategy}");
    println!("Period:         {} to {}", result.window.start, result.window.end);
    println!("Dataset:        {}", &data_hash[..16]);
    println!("Params:         {}", result.params.label());
    if let Some(err) = &result.error {
        println!("ERROR: {err}");
        return;
    }
    println!();
    println!("--- Performance ---");
    print_metrics(result);
}
