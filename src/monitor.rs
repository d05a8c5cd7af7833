// =============================================================================
// Monitor — shared facade over buffer, session, scheduler, and exporter
// =============================================================================
//
// One object wires the whole pipeline from a validated config and exposes the
// control surface the binary (and embedders) drive: run cycles, inspect
// status, pull indicator/correlation views, build export rows.
//
// Thread safety:
//   - Immutable after construction; share behind an `Arc`.
//   - Buffer and session carry their own interior locks.
//   - `stop()` signals the scheduler's watch channel and is safe to call
//     from any task, any number of times.
// =============================================================================

use std::sync::Arc;

use crate::analytics::{matrix_from_buffer, risk_return_from_buffer, CorrelationMatrix, RiskReturnPoint};
use crate::buffer::QuoteBuffer;
use crate::config::MonitorConfig;
use crate::error::{IndicatorError, SchedulerError, SinkError};
use crate::export::{Exporter, ExportShape};
use crate::indicators::{IndicatorParams, IndicatorSet};
use crate::quote::QuoteSource;
use crate::scheduler::Scheduler;
use crate::session::{CycleReport, MonitoringSession, SessionSnapshot};
use crate::sink::{Row, RowSink};

pub struct Monitor {
    config: MonitorConfig,
    params: IndicatorParams,
    buffer: Arc<QuoteBuffer>,
    session: Arc<MonitoringSession>,
    scheduler: Scheduler,
    exporter: Exporter,
}

impl Monitor {
    /// Wire every subsystem from a validated config and a quote source.
    pub fn new(config: MonitorConfig, source: Arc<dyn QuoteSource>) -> Self {
        let buffer = Arc::new(QuoteBuffer::new(config.retention_cap));
        let session = Arc::new(MonitoringSession::new());
        let scheduler = Scheduler::new(
            &config,
            source,
            Arc::clone(&buffer),
            Arc::clone(&session),
        );
        let exporter = Exporter::new(&config);
        let params = IndicatorParams::from_config(&config);

        Self {
            config,
            params,
            buffer,
            session,
            scheduler,
            exporter,
        }
    }

    // ── Acquisition ─────────────────────────────────────────────────────

    /// One cycle over the watchlist; returns the per-symbol report.
    pub async fn run_once(&self) -> Result<CycleReport, SchedulerError> {
        self.scheduler.run_once().await
    }

    /// Cycle at the configured interval until [`stop`](Self::stop).
    pub async fn run_continuous(&self) -> Result<(), SchedulerError> {
        self.scheduler.run_continuous().await
    }

    /// Request a stop; the in-flight cycle finishes first.
    pub fn stop(&self) {
        self.scheduler.stop();
    }

    // ── Views ───────────────────────────────────────────────────────────

    /// Indicator set over the most recent `window` closes of `symbol`.
    pub fn indicator_set(&self, symbol: &str, window: usize) -> IndicatorSet {
        IndicatorSet::compute(&self.buffer.closes(symbol, window), &self.params)
    }

    /// Pairwise correlation over the symbols' aligned return series.
    pub fn correlation_matrix(&self, symbols: &[String], window: usize) -> CorrelationMatrix {
        matrix_from_buffer(&self.buffer, symbols, window)
    }

    /// Annualized risk/return per symbol, with the skipped ones reported.
    pub fn risk_return(
        &self,
        symbols: &[String],
        window: usize,
    ) -> (Vec<RiskReturnPoint>, Vec<(String, IndicatorError)>) {
        risk_return_from_buffer(
            &self.buffer,
            symbols,
            window,
            self.config.annualization_factor,
        )
    }

    /// Session counters and last-cycle outcomes.
    pub fn status(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    // ── Export ──────────────────────────────────────────────────────────

    /// Rows for one table shape, built from current buffer contents.
    pub fn export(&self, shape: ExportShape) -> Vec<Row> {
        self.exporter.rows(shape, &self.buffer)
    }

    /// Build and append one shape to a sink.
    pub fn export_to(&self, shape: ExportShape, sink: &dyn RowSink) -> Result<usize, SinkError> {
        self.exporter.export_to(shape, &self.buffer, sink)
    }

    /// Append every shape; returns total rows written.
    pub fn export_all(&self, sink: &dyn RowSink) -> Result<usize, SinkError> {
        self.exporter.export_all(&self.buffer, sink)
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn buffer(&self) -> Arc<QuoteBuffer> {
        Arc::clone(&self.buffer)
    }
}
