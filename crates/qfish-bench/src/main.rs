use std::path::PathBuf;

use clap::Parser;

use qfish_bench::config::{BenchConfig, ResolvedOutputs};
use qfish_bench::logging::init_logging;
use qfish_bench::runner::BenchRunner;
use qfish_core::AppInfo;

/// Benchmark harness for Quantum Go Fish strategies.
#[derive(Debug, Parser)]
#[command(
    name = "qfish-bench",
    author,
    version = AppInfo::version(),
    about = "Plays configured Quantum Go Fish games and records the results"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/bench.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the solver's node budget per search.
    #[arg(long, value_name = "NODES")]
    max_nodes: Option<usize>,

    /// Override the solver's time limit per search, in milliseconds.
    #[arg(long, value_name = "MS")]
    time_limit_ms: Option<u64>,

    /// Exit after validating the configuration (no games are played).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = BenchConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(max_nodes) = cli.max_nodes {
        config.solver.max_nodes = Some(max_nodes);
    }

    if let Some(time_limit_ms) = cli.time_limit_ms {
        config.solver.time_limit_ms = Some(time_limit_ms);
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let game_count = config.games.len();
    let run_id = config.run_id.clone();

    println!(
        "{} {}: loaded configuration '{run_id}' with {game_count} game{}",
        AppInfo::codename(),
        AppInfo::version(),
        if game_count == 1 { "" } else { "s" }
    );

    let _logging_guard = init_logging(&config, &outputs)?;
    let runner = BenchRunner::new(config, outputs)?;

    if cli.validate_only {
        println!("Validation-only mode: no games played.");
        return Ok(());
    }

    let summary = runner.run()?;
    println!(
        "Bench complete for '{run_id}': {} games ({} draws) → {} rows at {}",
        summary.games_played,
        summary.draws,
        summary.rows_written,
        summary.jsonl_path.display()
    );
    println!("Summary table: {}", summary.summary_path.display());
    if let Some(telemetry_path) = summary.telemetry_path.as_ref() {
        println!("Telemetry log: {}", telemetry_path.display());
    }

    Ok(())
}
