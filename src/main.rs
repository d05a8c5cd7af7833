// =============================================================================
// QuotePulse — Main Entry Point
// =============================================================================
//
// Watchlist quote monitor: fetch quotes on a schedule, buffer the series,
// derive indicators and cross-sectional analytics, export CSV tables.
//
// Modes (first CLI argument):
//   once     one acquisition cycle, export every table, exit (default)
//   watch    continuous cycles until Ctrl+C, then a final export
//   export   one cycle, then export a single named table
//            (daily | historical | summary | performance)
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analytics;
mod buffer;
mod config;
mod error;
mod export;
mod indicators;
mod meta;
mod monitor;
mod provider;
mod quote;
mod scheduler;
mod session;
mod sink;

use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::analytics::group_averages;
use crate::config::MonitorConfig;
use crate::export::ExportShape;
use crate::monitor::Monitor;
use crate::provider::YahooQuoteClient;
use crate::session::CycleReport;
use crate::sink::CsvSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        QuotePulse — Starting Up                          ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path =
        std::env::var("QUOTEPULSE_CONFIG").unwrap_or_else(|_| "quotepulse.json".to_string());
    let mut config = MonitorConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(path = %config_path, error = %e, "failed to load config, using defaults");
        MonitorConfig::default()
    });

    // Watchlist and output overrides from the environment.
    if let Ok(syms) = std::env::var("QUOTEPULSE_SYMBOLS") {
        let parsed: Vec<String> = syms
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if !parsed.is_empty() {
            config.symbols = parsed;
        }
    }
    if let Ok(dir) = std::env::var("QUOTEPULSE_OUTPUT_DIR") {
        config.output_dir = dir;
    }

    config.validate().context("invalid configuration")?;

    info!(
        symbols = ?config.symbols,
        interval_secs = config.update_interval_secs,
        output_dir = %config.output_dir,
        "watchlist configured"
    );

    // ── 2. Mode selection ────────────────────────────────────────────────
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = args.first().map(String::as_str).unwrap_or("once");

    // ── 3. Wire the pipeline ─────────────────────────────────────────────
    let sink = CsvSink::new(&config.output_dir);
    let monitor = Arc::new(Monitor::new(config, Arc::new(YahooQuoteClient::new())));

    match mode {
        "once" => run_once(&monitor, &sink).await?,
        "watch" => run_watch(Arc::clone(&monitor), &sink).await?,
        "export" => {
            let shape = match args.get(1) {
                Some(raw) => Some(ExportShape::parse(raw).ok_or_else(|| {
                    anyhow::anyhow!(
                        "unknown export shape '{raw}' \
                         (expected daily, historical, summary, or performance)"
                    )
                })?),
                None => None,
            };
            run_export(&monitor, &sink, shape).await?;
        }
        other => {
            anyhow::bail!("unknown mode '{other}' (expected once, watch, or export)");
        }
    }

    info!("QuotePulse shut down complete.");
    Ok(())
}

// ── once ─────────────────────────────────────────────────────────────────────

async fn run_once(monitor: &Monitor, sink: &CsvSink) -> anyhow::Result<()> {
    let report = monitor.run_once().await?;
    log_cycle_summary(monitor, &report);

    let written = monitor.export_all(sink).context("writing export tables")?;
    info!(rows = written, dir = %sink.dir().display(), "export complete");
    Ok(())
}

// ── watch ────────────────────────────────────────────────────────────────────

async fn run_watch(monitor: Arc<Monitor>, sink: &CsvSink) -> anyhow::Result<()> {
    let worker = Arc::clone(&monitor);
    let handle = tokio::spawn(async move { worker.run_continuous().await });

    info!("continuous monitoring running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("listening for shutdown signal")?;
    warn!("shutdown signal received, stopping after the in-flight cycle");

    monitor.stop();
    handle.await.context("acquisition task panicked")??;

    let status = monitor.status();
    info!(
        cycles = status.cycles_completed,
        successes = status.fetch_successes,
        failures = status.fetch_failures,
        retries = status.retries_performed,
        "session finished"
    );
    log_session_analytics(&monitor);

    let written = monitor.export_all(sink).context("writing export tables")?;
    info!(rows = written, dir = %sink.dir().display(), "final export complete");
    Ok(())
}

// ── export ───────────────────────────────────────────────────────────────────

async fn run_export(
    monitor: &Monitor,
    sink: &CsvSink,
    shape: Option<ExportShape>,
) -> anyhow::Result<()> {
    let report = monitor.run_once().await?;
    log_cycle_summary(monitor, &report);

    let written = match shape {
        Some(shape) => monitor
            .export_to(shape, sink)
            .context("writing export table")?,
        None => monitor.export_all(sink).context("writing export tables")?,
    };
    info!(rows = written, dir = %sink.dir().display(), "export complete");
    Ok(())
}

// ── Reporting ────────────────────────────────────────────────────────────────

/// Log the cycle outcome plus the average move per sector of the fresh quotes.
fn log_cycle_summary(monitor: &Monitor, report: &CycleReport) {
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "cycle finished"
    );

    let meta = monitor.config().meta_table();
    let buffer = monitor.buffer();
    let changes: Vec<(String, f64)> = report
        .outcomes
        .iter()
        .filter(|(_, outcome)| outcome.is_success())
        .filter_map(|(symbol, _)| {
            let quote = buffer.latest(symbol)?;
            let change = quote.change_percent().ok()?;
            Some((symbol.clone(), change))
        })
        .collect();

    for group in group_averages(&changes, |symbol| meta.sector(symbol)) {
        info!(
            sector = %group.group,
            mean_change_pct = group.mean,
            members = group.members,
            "sector average"
        );
    }

    // Surface which indicators are still warming up, per fresh symbol.
    let window = monitor.config().retention_cap;
    for (symbol, _) in report.outcomes.iter().filter(|(_, o)| o.is_success()) {
        let set = monitor.indicator_set(symbol, window);
        for (indicator, reason) in set.unavailable() {
            debug!(symbol = %symbol, indicator = %indicator, %reason, "indicator warming up");
        }
    }
}

/// Log the cross-sectional view of everything the session buffered:
/// annualized risk/return per symbol and the strongly correlated pairs.
fn log_session_analytics(monitor: &Monitor) {
    let config = monitor.config();
    let window = config.retention_cap;
    let symbols = config.symbols.clone();

    let (points, skipped) = monitor.risk_return(&symbols, window);
    for point in &points {
        info!(
            symbol = %point.symbol,
            annualized_return_pct = point.annualized_return * 100.0,
            annualized_volatility_pct = point.annualized_volatility * 100.0,
            "risk/return"
        );
    }
    for (symbol, reason) in &skipped {
        debug!(symbol = %symbol, %reason, "risk/return needs more history");
    }

    let matrix = monitor.correlation_matrix(&symbols, window);
    for (i, a) in matrix.symbols.iter().enumerate() {
        for (j, b) in matrix.symbols.iter().enumerate().skip(i + 1) {
            // Only surface the pairs worth a second look.
            if let Some(r) = matrix.matrix[i][j] {
                if r.abs() >= 0.7 {
                    info!(pair = %format!("{a}/{b}"), correlation = r, "strongly correlated");
                }
            }
        }
    }
}
