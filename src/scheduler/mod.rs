// =============================================================================
// Acquisition Scheduler
// =============================================================================
//
// Drives periodic or one-shot quote acquisition over the watchlist. Each
// cycle fetches every symbol with bounded parallelism, retries transient
// failures per the configured policy, and appends successes to the buffer.
// A cycle with some symbols failing is a partial success; the report carries
// every per-symbol outcome.
//
// Timing rules:
//   - Every fetch attempt runs under a timeout; a hung call becomes a
//     Transient failure instead of stalling the cycle.
//   - The inter-cycle wait is interruptible by stop(). A stop during a
//     cycle lets the cycle finish; no fetch is aborted mid-flight.
//   - A cycle that overruns the interval is followed immediately, so an
//     overrun never compounds into a growing backlog.
// =============================================================================

pub mod retry;

pub use retry::RetryPolicy;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::buffer::QuoteBuffer;
use crate::config::MonitorConfig;
use crate::error::{FetchError, SchedulerError};
use crate::quote::{Quote, QuoteSource};
use crate::session::{CycleReport, MonitoringSession, SymbolOutcome};

// =============================================================================
// Scheduler
// =============================================================================

/// Cycle driver. Cheap to share behind an `Arc`; all mutable state lives in
/// the session and the buffer.
pub struct Scheduler {
    source: Arc<dyn QuoteSource>,
    buffer: Arc<QuoteBuffer>,
    session: Arc<MonitoringSession>,
    symbols: Vec<String>,
    interval: Duration,
    fetch_timeout: Duration,
    retry: RetryPolicy,
    limiter: Arc<Semaphore>,
    stop_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(
        config: &MonitorConfig,
        source: Arc<dyn QuoteSource>,
        buffer: Arc<QuoteBuffer>,
        session: Arc<MonitoringSession>,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            source,
            buffer,
            session,
            symbols: config.symbols.clone(),
            interval: config.update_interval(),
            fetch_timeout: config.fetch_timeout(),
            retry: RetryPolicy::from_config(config),
            limiter: Arc::new(Semaphore::new(config.max_concurrent_fetches)),
            stop_tx,
        }
    }

    pub fn session(&self) -> Arc<MonitoringSession> {
        Arc::clone(&self.session)
    }

    // ── One-shot ────────────────────────────────────────────────────────

    /// Run a single acquisition cycle over the whole watchlist.
    pub async fn run_once(&self) -> Result<CycleReport, SchedulerError> {
        self.session.begin()?;
        let report = self.run_cycle().await;
        self.session.record_cycle(&report);
        self.session.finish();
        Ok(report)
    }

    // ── Continuous ──────────────────────────────────────────────────────

    /// Loop cycles separated by the configured interval until
    /// [`stop`](Self::stop) is called.
    pub async fn run_continuous(&self) -> Result<(), SchedulerError> {
        self.session.begin()?;
        // Clear any stop left over from a previous run.
        self.stop_tx.send_replace(false);
        let mut stop_rx = self.stop_tx.subscribe();

        info!(
            symbols = self.symbols.len(),
            interval_secs = self.interval.as_secs(),
            "continuous acquisition started"
        );

        loop {
            let report = self.run_cycle().await;
            self.session.record_cycle(&report);

            if self.session.stop_requested() || *stop_rx.borrow() {
                break;
            }

            // An overrunning cycle is followed immediately; sleeping the full
            // interval on top of the overrun would build an unbounded backlog.
            if report.elapsed >= self.interval {
                warn!(
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    interval_ms = self.interval.as_millis() as u64,
                    "cycle overran the interval, starting next cycle immediately"
                );
                continue;
            }

            let wait = self.interval - report.elapsed;
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = stop_rx.changed() => {
                    debug!("stop received during inter-cycle wait");
                    break;
                }
            }
        }

        self.session.finish();
        info!("continuous acquisition stopped");
        Ok(())
    }

    /// Request a stop. The in-flight cycle (if any) finishes first; an idle
    /// inter-cycle wait is cut short.
    pub fn stop(&self) {
        if self.session.request_stop() {
            info!("stop requested, letting the in-flight cycle finish");
        }
        let _ = self.stop_tx.send(true);
    }

    // ── Cycle internals ─────────────────────────────────────────────────

    async fn run_cycle(&self) -> CycleReport {
        let started_at = Utc::now();
        let begun = Instant::now();

        let mut tasks: Vec<(String, JoinHandle<(SymbolOutcome, Option<Quote>)>)> =
            Vec::with_capacity(self.symbols.len());

        for symbol in &self.symbols {
            let source = Arc::clone(&self.source);
            let limiter = Arc::clone(&self.limiter);
            let fetch_timeout = self.fetch_timeout;
            let policy = self.retry;
            let task_symbol = symbol.clone();

            let handle = tokio::spawn(async move {
                // The semaphore lives as long as the scheduler, so this only
                // fails if the runtime is tearing down.
                let Ok(_permit) = limiter.acquire_owned().await else {
                    return (
                        SymbolOutcome::Failed {
                            error: FetchError::Transient {
                                message: "fetch slot unavailable".to_string(),
                            },
                            attempts: 0,
                        },
                        None,
                    );
                };
                fetch_with_retry(source.as_ref(), &task_symbol, fetch_timeout, policy).await
            });
            tasks.push((symbol.clone(), handle));
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (symbol, handle) in tasks {
            let (outcome, quote) = match handle.await {
                Ok(result) => result,
                Err(join_error) => (
                    SymbolOutcome::Failed {
                        error: FetchError::Transient {
                            message: format!("fetch task failed: {join_error}"),
                        },
                        attempts: 0,
                    },
                    None,
                ),
            };

            if let Some(quote) = quote {
                if !self.buffer.append(quote) {
                    debug!(symbol = %symbol, "timestamp already buffered, append skipped");
                }
            }

            match &outcome {
                SymbolOutcome::Success { attempts } => {
                    debug!(symbol = %symbol, attempts, "fetch succeeded");
                }
                SymbolOutcome::Failed { error, attempts } => {
                    warn!(symbol = %symbol, attempts, error = %error, "fetch failed");
                }
            }
            outcomes.push((symbol, outcome));
        }

        let report = CycleReport {
            started_at,
            elapsed: begun.elapsed(),
            outcomes,
        };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "acquisition cycle complete"
        );
        report
    }
}

/// Fetch one symbol, retrying transient failures per the policy. Every
/// attempt is bounded by `fetch_timeout`; an elapsed timeout counts as a
/// transient failure. NotFound and MalformedResponse are never retried.
async fn fetch_with_retry(
    source: &dyn QuoteSource,
    symbol: &str,
    fetch_timeout: Duration,
    policy: RetryPolicy,
) -> (SymbolOutcome, Option<Quote>) {
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let result = match tokio::time::timeout(fetch_timeout, source.fetch_quote(symbol)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Transient {
                message: format!("no response within {}s", fetch_timeout.as_secs()),
            }),
        };

        match result {
            Ok(quote) => return (SymbolOutcome::Success { attempts }, Some(quote)),
            Err(error) if error.is_retryable() && attempts < policy.max_attempts() => {
                let delay = policy.delay_for(attempts - 1);
                debug!(
                    symbol = %symbol,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return (SymbolOutcome::Failed { error, attempts }, None),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    use crate::session::RunState;

    fn quote(symbol: &str, minute: u32) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 14, minute, 0).unwrap(),
            price: 100.0 + minute as f64,
            previous_close: Some(100.0),
            open: Some(100.5),
            high: Some(101.0 + minute as f64),
            low: Some(99.0),
            volume: Some(1_000_000),
            market_cap: Some(1.0e12),
            fifty_two_week_high: None,
            fifty_two_week_low: None,
        }
    }

    fn transient(msg: &str) -> FetchError {
        FetchError::Transient {
            message: msg.to_string(),
        }
    }

    /// Replays a scripted response sequence per symbol; once a script runs
    /// dry it serves fresh quotes with distinct timestamps.
    struct ScriptedSource {
        scripts: Mutex<HashMap<String, VecDeque<Result<Quote, FetchError>>>>,
        calls: Mutex<HashMap<String, u32>>,
        fallback_minute: AtomicU32,
    }

    impl ScriptedSource {
        fn new(scripts: Vec<(&str, Vec<Result<Quote, FetchError>>)>) -> Self {
            Self {
                scripts: Mutex::new(
                    scripts
                        .into_iter()
                        .map(|(s, seq)| (s.to_string(), seq.into_iter().collect()))
                        .collect(),
                ),
                calls: Mutex::new(HashMap::new()),
                fallback_minute: AtomicU32::new(30),
            }
        }

        fn calls_for(&self, symbol: &str) -> u32 {
            self.calls.lock().get(symbol).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl QuoteSource for ScriptedSource {
        async fn fetch_quote(&self, symbol: &str) -> Result<Quote, FetchError> {
            *self.calls.lock().entry(symbol.to_string()).or_insert(0) += 1;
            if let Some(next) = self
                .scripts
                .lock()
                .get_mut(symbol)
                .and_then(|seq| seq.pop_front())
            {
                return next;
            }
            let minute = self.fallback_minute.fetch_add(1, Ordering::SeqCst) % 60;
            Ok(quote(symbol, minute))
        }
    }

    /// Takes a fixed amount of (virtual) time to answer each call and
    /// records when each call arrived.
    struct SlowSource {
        delay: Duration,
        call_times: Mutex<Vec<Instant>>,
        calls: AtomicU32,
    }

    impl SlowSource {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                call_times: Mutex::new(Vec::new()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl QuoteSource for SlowSource {
        async fn fetch_quote(&self, symbol: &str) -> Result<Quote, FetchError> {
            self.call_times.lock().push(Instant::now());
            let minute = self.calls.fetch_add(1, Ordering::SeqCst) % 60;
            tokio::time::sleep(self.delay).await;
            Ok(quote(symbol, minute))
        }
    }

    fn test_config(symbols: &[&str], max_retries: u32) -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.symbols = symbols.iter().map(|s| s.to_string()).collect();
        config.max_retries = max_retries;
        config.retry_base_delay_ms = 1000;
        config.retry_multiplier = 2.0;
        config.retry_max_delay_secs = 30;
        config
    }

    fn build(
        config: &MonitorConfig,
        source: Arc<dyn QuoteSource>,
    ) -> (Scheduler, Arc<QuoteBuffer>, Arc<MonitoringSession>) {
        let buffer = Arc::new(QuoteBuffer::new(config.retention_cap));
        let session = Arc::new(MonitoringSession::new());
        let scheduler = Scheduler::new(config, source, Arc::clone(&buffer), Arc::clone(&session));
        (scheduler, buffer, session)
    }

    // ── Retry behaviour ─────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn three_transients_then_success_within_bound_of_four() {
        let source = Arc::new(ScriptedSource::new(vec![(
            "AAPL",
            vec![
                Err(transient("reset")),
                Err(transient("reset")),
                Err(transient("reset")),
                Ok(quote("AAPL", 30)),
            ],
        )]));
        // max_retries 3 -> 4 total attempts.
        let config = test_config(&["AAPL"], 3);
        let (scheduler, buffer, _) = build(&config, source.clone());

        let report = scheduler.run_once().await.unwrap();

        assert_eq!(
            report.outcome("AAPL"),
            Some(&SymbolOutcome::Success { attempts: 4 })
        );
        assert_eq!(source.calls_for("AAPL"), 4);
        assert_eq!(buffer.len("AAPL"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bound_of_three_records_the_transient_failure() {
        let source = Arc::new(ScriptedSource::new(vec![
            (
                "AAPL",
                vec![
                    Err(transient("reset")),
                    Err(transient("reset")),
                    Err(transient("reset")),
                ],
            ),
            ("MSFT", vec![Ok(quote("MSFT", 30))]),
        ]));
        // max_retries 2 -> 3 total attempts; the 4th would have succeeded.
        let config = test_config(&["AAPL", "MSFT"], 2);
        let (scheduler, buffer, _) = build(&config, source.clone());

        let report = scheduler.run_once().await.unwrap();

        assert!(matches!(
            report.outcome("AAPL"),
            Some(SymbolOutcome::Failed {
                error: FetchError::Transient { .. },
                attempts: 3
            })
        ));
        // The other symbol still completed.
        assert_eq!(
            report.outcome("MSFT"),
            Some(&SymbolOutcome::Success { attempts: 1 })
        );
        assert!(report.is_partial());
        assert_eq!(buffer.len("AAPL"), 0);
        assert_eq!(buffer.len("MSFT"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_not_retried() {
        let source = Arc::new(ScriptedSource::new(vec![
            ("AAPL", vec![Ok(quote("AAPL", 30))]),
            (
                "MSFT",
                vec![Err(FetchError::NotFound {
                    symbol: "MSFT".to_string(),
                })],
            ),
        ]));
        let config = test_config(&["AAPL", "MSFT"], 3);
        let (scheduler, buffer, _) = build(&config, source.clone());

        let report = scheduler.run_once().await.unwrap();

        assert_eq!(
            report.outcome("AAPL"),
            Some(&SymbolOutcome::Success { attempts: 1 })
        );
        assert!(matches!(
            report.outcome("MSFT"),
            Some(SymbolOutcome::Failed {
                error: FetchError::NotFound { .. },
                attempts: 1
            })
        ));
        assert_eq!(source.calls_for("MSFT"), 1);
        assert_eq!(buffer.len("AAPL"), 1);
        assert_eq!(buffer.len("MSFT"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_response_is_not_retried() {
        let source = Arc::new(ScriptedSource::new(vec![(
            "AAPL",
            vec![Err(FetchError::MalformedResponse {
                message: "price missing".to_string(),
            })],
        )]));
        let config = test_config(&["AAPL"], 3);
        let (scheduler, _, _) = build(&config, source.clone());

        let report = scheduler.run_once().await.unwrap();

        assert!(matches!(
            report.outcome("AAPL"),
            Some(SymbolOutcome::Failed { attempts: 1, .. })
        ));
        assert_eq!(source.calls_for("AAPL"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_fetch_times_out_as_transient() {
        let source = Arc::new(SlowSource::new(Duration::from_secs(300)));
        let mut config = test_config(&["AAPL"], 0);
        config.fetch_timeout_secs = 10;
        let (scheduler, buffer, _) = build(&config, source);

        let report = scheduler.run_once().await.unwrap();

        match report.outcome("AAPL") {
            Some(SymbolOutcome::Failed {
                error: FetchError::Transient { message },
                attempts: 1,
            }) => assert!(message.contains("no response within")),
            other => panic!("expected transient timeout, got {other:?}"),
        }
        assert_eq!(buffer.len("AAPL"), 0);
        // The cycle waited out the timeout, not the full fetch.
        assert!(report.elapsed >= Duration::from_secs(10));
        assert!(report.elapsed < Duration::from_secs(300));
    }

    // ── Buffer interaction ──────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn refetched_timestamp_is_not_appended_twice() {
        let same = quote("AAPL", 30);
        let source = Arc::new(ScriptedSource::new(vec![(
            "AAPL",
            vec![Ok(same.clone()), Ok(same)],
        )]));
        let config = test_config(&["AAPL"], 0);
        let (scheduler, buffer, _) = build(&config, source);

        scheduler.run_once().await.unwrap();
        scheduler.run_once().await.unwrap();

        assert_eq!(buffer.len("AAPL"), 1);
    }

    // ── Session interaction ─────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn run_once_rejected_while_session_active() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let config = test_config(&["AAPL"], 0);
        let (scheduler, _, session) = build(&config, source);

        session.begin().unwrap();
        assert_eq!(
            scheduler.run_once().await.unwrap_err(),
            SchedulerError::AlreadyRunning
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_once_records_outcomes_in_session() {
        let source = Arc::new(ScriptedSource::new(vec![(
            "MSFT",
            vec![Err(FetchError::NotFound {
                symbol: "MSFT".to_string(),
            })],
        )]));
        let config = test_config(&["AAPL", "MSFT"], 0);
        let (scheduler, _, session) = build(&config, source);

        scheduler.run_once().await.unwrap();

        assert_eq!(session.state(), RunState::Idle);
        assert_eq!(session.cycles_completed(), 1);
        let snap = session.snapshot();
        assert_eq!(snap.last_cycle["AAPL"], "success");
        assert_eq!(snap.last_cycle["MSFT"], "not_found");
    }

    // ── Continuous mode ─────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn overrunning_cycle_is_followed_immediately() {
        // 75s cycles against a 60s interval: the next cycle must start the
        // moment the previous one ends, not 60s later.
        let source = Arc::new(SlowSource::new(Duration::from_secs(75)));
        let mut config = test_config(&["AAPL"], 0);
        config.update_interval_secs = 60;
        config.fetch_timeout_secs = 120;
        let (scheduler, _, _) = build(&config, Arc::clone(&source) as Arc<dyn QuoteSource>);
        let scheduler = Arc::new(scheduler);

        let runner = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run_continuous().await })
        };

        while source.calls.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        scheduler.stop();
        runner.await.unwrap().unwrap();

        let times = source.call_times.lock();
        let gap = times[1] - times[0];
        assert!(
            gap >= Duration::from_secs(75) && gap < Duration::from_secs(76),
            "expected back-to-back cycles, got a {gap:?} gap"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_the_inter_cycle_wait() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let mut config = test_config(&["AAPL"], 0);
        config.update_interval_secs = 3600;
        let (scheduler, _, session) = build(&config, source.clone());
        let scheduler = Arc::new(scheduler);

        let runner = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run_continuous().await })
        };

        while session.cycles_completed() < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        scheduler.stop();

        // Returns well before the hour-long interval elapses.
        tokio::time::timeout(Duration::from_secs(30), runner)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(session.state(), RunState::Idle);
        assert_eq!(session.cycles_completed(), 1);
        assert_eq!(source.calls_for("AAPL"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn parallelism_stays_within_the_configured_bound() {
        // 4 symbols, 2 slots, 10s per fetch: two waves of two.
        let source = Arc::new(SlowSource::new(Duration::from_secs(10)));
        let mut config = test_config(&["A", "B", "C", "D"], 0);
        config.max_concurrent_fetches = 2;
        config.fetch_timeout_secs = 60;
        let (scheduler, _, _) = build(&config, Arc::clone(&source) as Arc<dyn QuoteSource>);

        let report = scheduler.run_once().await.unwrap();

        assert_eq!(report.succeeded(), 4);
        let times = source.call_times.lock();
        let first_wave = times[0];
        // The third call cannot start until a slot frees at +10s.
        assert!(times[2] - first_wave >= Duration::from_secs(10));
        assert!(report.elapsed >= Duration::from_secs(20));
    }
}
