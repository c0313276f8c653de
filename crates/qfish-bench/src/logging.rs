use std::fs::{self, File};
use std::path::PathBuf;

use anyhow::{Context, Result};
use qfish_core::AppInfo;
use tracing::span::EnteredSpan;
use tracing::{Level, event, info_span};
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{BenchConfig, LoggingConfig, ResolvedOutputs};

/// Crates whose events reach the telemetry file at the configured level.
const TRACED_CRATES: [&str; 3] = ["qfish_bench", "qfish_bot", "qfish_core"];

/// Keeps telemetry flowing until dropped. The run span closes before the
/// writer flushes.
pub struct LoggingGuard {
    _run: EnteredSpan,
    _writer: WorkerGuard,
    pub telemetry_path: PathBuf,
}

/// Routes structured events for one bench run to its telemetry file. Every
/// event is tagged with the run id and game count through the `bench` span.
/// Returns `None` when structured logging is disabled.
pub fn init_logging(config: &BenchConfig, outputs: &ResolvedOutputs) -> Result<Option<LoggingGuard>> {
    if !config.logging.enable_structured {
        return Ok(None);
    }

    let telemetry_path = outputs.telemetry_jsonl();
    if let Some(dir) = telemetry_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating telemetry directory at {}", dir.display()))?;
    }
    let file = File::create(&telemetry_path)
        .with_context(|| format!("creating telemetry file at {}", telemetry_path.display()))?;
    let (writer, worker) = NonBlockingBuilder::default().lossy(false).finish(file);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(&config.logging)));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_span_events(FmtSpan::NONE)
        .with_writer(writer)
        .finish();

    // Tests may already have installed a global subscriber.
    let _ = tracing::subscriber::set_global_default(subscriber);

    let run = info_span!(
        target: "qfish_bench::run",
        "bench",
        app = AppInfo::name(),
        version = AppInfo::version(),
        run_id = %config.run_id,
        games = config.games.len(),
    )
    .entered();
    event!(
        target: "qfish_bench::run",
        Level::INFO,
        max_nodes = ?config.solver.max_nodes,
        time_limit_ms = ?config.solver.time_limit_ms,
        "telemetry started"
    );

    Ok(Some(LoggingGuard {
        _run: run,
        _writer: worker,
        telemetry_path,
    }))
}

/// Filter directives: our crates at the configured level, everything else at `warn`.
fn directives(logging: &LoggingConfig) -> String {
    let level = logging.level().unwrap_or(Level::INFO);
    let mut directives = String::from("warn");
    for name in TRACED_CRATES {
        directives.push_str(&format!(",{name}={}", level.as_str().to_ascii_lowercase()));
    }
    directives
}
