// =============================================================================
// Error taxonomy — classified failures across acquisition, analytics, and IO
// =============================================================================
//
// Four separate enums by recovery strategy:
//   - FetchError      recovered per symbol inside a cycle (only Transient
//                     is retried; the rest are recorded and skipped)
//   - IndicatorError  recovered per indicator (degraded set, never aborts)
//   - SinkError       surfaced to the exporter caller
//   - ConfigError     rejected at validation time, before anything runs
// =============================================================================

use thiserror::Error;

/// Classified failure from the quote source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The provider does not know the symbol (HTTP 404 or an empty result
    /// set for an otherwise well-formed response).
    #[error("symbol '{symbol}' not found")]
    NotFound { symbol: String },

    /// Network-level or throttling failure that may succeed on retry
    /// (timeouts, connect errors, HTTP 5xx / 429).
    #[error("transient fetch failure: {message}")]
    Transient { message: String },

    /// The provider answered but the payload cannot become a usable quote:
    /// unparseable body, missing price or timestamp, or a non-positive price.
    #[error("malformed provider response: {message}")]
    MalformedResponse { message: String },
}

impl FetchError {
    /// Whether the scheduler's retry policy applies to this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Stable label used in cycle reports and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Transient { .. } => "transient",
            Self::MalformedResponse { .. } => "malformed_response",
        }
    }
}

/// Failure from an indicator or derived-field computation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndicatorError {
    /// The window is shorter than the computation requires.
    #[error("insufficient data: need {required} points, have {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// A field the computation depends on is absent or degenerate, e.g. a
    /// zero or missing previous close when deriving change_percent.
    #[error("missing field '{field}'")]
    MissingField { field: &'static str },
}

/// Failure writing to or reading from the persistence sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O failure for table '{table}': {source}")]
    Io {
        table: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv failure for table '{table}': {source}")]
    Csv {
        table: String,
        #[source]
        source: csv::Error,
    },

    /// Read of a table that was never written.
    #[error("unknown table '{table}'")]
    UnknownTable { table: String },
}

/// Invalid configuration, rejected at validation time rather than first use.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("watchlist must contain at least one symbol")]
    EmptyWatchlist,

    #[error("watchlist entry {index} is blank")]
    BlankSymbol { index: usize },

    #[error("update interval must be positive")]
    NonPositiveInterval,

    #[error("per-fetch timeout must be positive")]
    NonPositiveTimeout,

    #[error("indicator period '{name}' must be positive")]
    NonPositivePeriod { name: &'static str },

    #[error("macd fast period ({fast}) must be less than slow period ({slow})")]
    MacdPeriodOrder { fast: usize, slow: usize },

    #[error("retention cap must be at least 1 entry")]
    ZeroRetention,

    #[error("fetch parallelism must be at least 1")]
    ZeroParallelism,

    #[error("annualization factor must be positive")]
    NonPositiveAnnualization,
}

/// Failure from a scheduler control operation. Per-symbol fetch failures are
/// not errors at this level; they are data in the cycle report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// `run_once` / `run_continuous` called while a cycle is in flight.
    #[error("scheduler is already running")]
    AlreadyRunning,
}
