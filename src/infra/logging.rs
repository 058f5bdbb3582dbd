// ============================================================
// Layer 6 — Logging Setup
// ============================================================
// Console output for every command; `train` additionally mirrors
// everything into `<saving_path>/run.log` so a run's history sits
// next to its checkpoints and metrics.
//
// Level control:
//   default          attention_transformer=info
//   RUST_LOG=...     overrides the default entirely, e.g.
//                    RUST_LOG="attention_transformer=debug,wgpu=warn"

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

pub const LOG_FILE: &str = "run.log";
const DEFAULT_DIRECTIVE: &str = "attention_transformer=info";

/// Local wall-clock timestamps, millisecond resolution.
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive
/// until the program exits.
pub fn init(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let console = fmt::layer()
        .with_timer(LocalTime)
        .with_target(false)
        .with_filter(env_filter());

    let Some(dir) = log_dir else {
        Registry::default()
            .with(console)
            .try_init()
            .context("Failed to install tracing subscriber")?;
        return Ok(None);
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory '{}'", dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(rolling::never(dir, LOG_FILE));
    let file = fmt::layer()
        .with_timer(LocalTime)
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(env_filter());

    Registry::default()
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!("Logging to '{}'", dir.join(LOG_FILE).display());
    Ok(Some(guard))
}
