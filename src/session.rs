// =============================================================================
// Monitoring Session
// =============================================================================
//
// Process-wide scheduler state: run status, per-symbol outcome of the last
// cycle, and fetch/retry counters. One session per scheduler; nothing here
// is global, so independent sessions can coexist in tests.
//
// Thread safety:
//   - Atomic counters for the cycle/fetch tallies.
//   - parking_lot::RwLock around the state machine and the outcome map.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{FetchError, SchedulerError};

// =============================================================================
// Run State
// =============================================================================

/// Scheduler lifecycle: `Idle → Running → (Idle | Stopping → Idle)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Stopping,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::Stopping => write!(f, "Stopping"),
        }
    }
}

// =============================================================================
// Cycle Outcomes
// =============================================================================

/// How one symbol fared in one acquisition cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    Success {
        /// Fetch attempts consumed, retries included.
        attempts: u32,
    },
    Failed {
        error: FetchError,
        attempts: u32,
    },
}

impl SymbolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Stable short label for logs and status snapshots.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Failed { error, .. } => error.kind(),
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts } | Self::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Outcome of one full pass over the watchlist.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// Per-symbol outcomes in watchlist order.
    pub outcomes: Vec<(String, SymbolOutcome)>,
}

impl CycleReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Some symbols landed, some did not.
    pub fn is_partial(&self) -> bool {
        self.succeeded() > 0 && self.failed() > 0
    }

    pub fn outcome(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.outcomes
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, o)| o)
    }
}

// =============================================================================
// MonitoringSession
// =============================================================================

/// Shared scheduler state, typically wrapped in `Arc`.
pub struct MonitoringSession {
    state: RwLock<RunState>,
    started_at: RwLock<Option<DateTime<Utc>>>,

    // ── Counters ────────────────────────────────────────────────────────
    cycles_completed: AtomicU64,
    fetch_successes: AtomicU64,
    fetch_failures: AtomicU64,
    retries_performed: AtomicU64,

    // ── Last cycle ──────────────────────────────────────────────────────
    last_outcomes: RwLock<HashMap<String, SymbolOutcome>>,
}

impl MonitoringSession {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RunState::Idle),
            started_at: RwLock::new(None),
            cycles_completed: AtomicU64::new(0),
            fetch_successes: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            retries_performed: AtomicU64::new(0),
            last_outcomes: RwLock::new(HashMap::new()),
        }
    }

    // ── State machine ───────────────────────────────────────────────────

    pub fn state(&self) -> RunState {
        *self.state.read()
    }

    /// `Idle → Running`. Fails if a run is already active so two loops can
    /// never drive the same session.
    pub fn begin(&self) -> Result<(), SchedulerError> {
        {
            let mut state = self.state.write();
            if *state != RunState::Idle {
                return Err(SchedulerError::AlreadyRunning);
            }
            *state = RunState::Running;
        }
        *self.started_at.write() = Some(Utc::now());
        Ok(())
    }

    /// `Running → Stopping`. Returns false when there is nothing to stop.
    pub fn request_stop(&self) -> bool {
        let mut state = self.state.write();
        if *state == RunState::Running {
            *state = RunState::Stopping;
            true
        } else {
            false
        }
    }

    pub fn stop_requested(&self) -> bool {
        *self.state.read() == RunState::Stopping
    }

    /// Back to `Idle`, whatever the current state.
    pub fn finish(&self) {
        *self.state.write() = RunState::Idle;
    }

    // ── Cycle accounting ────────────────────────────────────────────────

    /// Fold a finished cycle into the counters and the last-outcome map.
    pub fn record_cycle(&self, report: &CycleReport) {
        let mut successes = 0u64;
        let mut failures = 0u64;
        let mut retries = 0u64;
        for (_, outcome) in &report.outcomes {
            if outcome.is_success() {
                successes += 1;
            } else {
                failures += 1;
            }
            retries += u64::from(outcome.attempts().saturating_sub(1));
        }

        self.cycles_completed.fetch_add(1, Ordering::SeqCst);
        self.fetch_successes.fetch_add(successes, Ordering::SeqCst);
        self.fetch_failures.fetch_add(failures, Ordering::SeqCst);
        self.retries_performed.fetch_add(retries, Ordering::SeqCst);

        *self.last_outcomes.write() = report.outcomes.iter().cloned().collect();
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::SeqCst)
    }

    pub fn last_outcome(&self, symbol: &str) -> Option<SymbolOutcome> {
        self.last_outcomes.read().get(symbol).cloned()
    }

    // ── Snapshot ────────────────────────────────────────────────────────

    /// Serialisable status view for logs or a status command.
    pub fn snapshot(&self) -> SessionSnapshot {
        let last_cycle = self
            .last_outcomes
            .read()
            .iter()
            .map(|(symbol, outcome)| (symbol.clone(), outcome.label().to_string()))
            .collect();

        SessionSnapshot {
            state: self.state().to_string(),
            started_at: self.started_at.read().map(|t| t.to_rfc3339()),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            fetch_successes: self.fetch_successes.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            retries_performed: self.retries_performed.load(Ordering::Relaxed),
            last_cycle,
        }
    }
}

impl Default for MonitoringSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: String,
    pub started_at: Option<String>,
    pub cycles_completed: u64,
    pub fetch_successes: u64,
    pub fetch_failures: u64,
    pub retries_performed: u64,
    /// Symbol → outcome label from the most recent cycle.
    pub last_cycle: HashMap<String, String>,
}
