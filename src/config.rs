// =============================================================================
// Monitor Configuration — typed, validated, with atomic save
// =============================================================================
//
// Every tunable lives here: the watchlist, acquisition cadence, retry policy
// inputs, retention, and indicator periods.
//
// All fields carry `#[serde(default)]` so adding new fields never breaks
// loading an older config file. Validation happens at construction time via
// `validate()` — an empty watchlist or a zero interval is rejected before the
// scheduler ever runs, not on first use.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::meta::MetaTable;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec![
        "AAPL".to_string(),
        "MSFT".to_string(),
        "GOOGL".to_string(),
        "AMZN".to_string(),
        "TSLA".to_string(),
    ]
}

fn default_update_interval_secs() -> u64 {
    900
}

fn default_retention_cap() -> usize {
    500
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_retry_multiplier() -> f64 {
    2.0
}

fn default_retry_max_delay_secs() -> u64 {
    30
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_annualization_factor() -> f64 {
    252.0
}

fn default_sma_periods() -> Vec<usize> {
    vec![5, 20, 50]
}

fn default_ema_period() -> usize {
    20
}

fn default_rsi_period() -> usize {
    14
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

fn default_bollinger_period() -> usize {
    20
}

fn default_bollinger_k() -> f64 {
    2.0
}

fn default_volatility_period() -> usize {
    20
}

fn default_output_dir() -> String {
    "data".to_string()
}

// =============================================================================
// MonitorConfig
// =============================================================================

/// Top-level configuration for the quote monitor.
///
/// Every field has a serde default so older JSON files missing new fields
/// still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    // --- Watchlist & cadence -------------------------------------------------

    /// Symbols to acquire each cycle, in watchlist order.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Seconds between acquisition cycles in continuous mode.
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,

    /// Maximum retained quotes per symbol; oldest evicted beyond this.
    #[serde(default = "default_retention_cap")]
    pub retention_cap: usize,

    // --- Fetch & retry -------------------------------------------------------

    /// Retries per symbol per cycle after a transient failure.
    /// Total attempts = `max_retries + 1`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay after a transient failure, milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Multiplier applied to the backoff delay per attempt.
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,

    /// Ceiling on any single backoff delay, seconds.
    #[serde(default = "default_retry_max_delay_secs")]
    pub retry_max_delay_secs: u64,

    /// Per-fetch timeout, seconds. A fetch exceeding this is recorded as a
    /// transient failure.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Upper bound on simultaneous in-flight fetches within a cycle.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    // --- Analytics -----------------------------------------------------------

    /// Trading periods per year for annualising volatility and returns.
    #[serde(default = "default_annualization_factor")]
    pub annualization_factor: f64,

    /// Simple moving average periods computed per symbol.
    #[serde(default = "default_sma_periods")]
    pub sma_periods: Vec<usize>,

    #[serde(default = "default_ema_period")]
    pub ema_period: usize,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,

    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,

    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,

    #[serde(default = "default_bollinger_period")]
    pub bollinger_period: usize,

    /// Standard-deviation multiplier for the Bollinger envelope.
    #[serde(default = "default_bollinger_k")]
    pub bollinger_k: f64,

    /// Window of period-over-period returns for rolling volatility.
    #[serde(default = "default_volatility_period")]
    pub volatility_period: usize,

    // --- Output --------------------------------------------------------------

    /// Directory where the CSV sink writes its tables.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Per-symbol name/sector overrides, merged over the built-in table.
    #[serde(default)]
    pub symbol_meta: MetaTable,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            update_interval_secs: default_update_interval_secs(),
            retention_cap: default_retention_cap(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_multiplier: default_retry_multiplier(),
            retry_max_delay_secs: default_retry_max_delay_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            annualization_factor: default_annualization_factor(),
            sma_periods: default_sma_periods(),
            ema_period: default_ema_period(),
            rsi_period: default_rsi_period(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            bollinger_period: default_bollinger_period(),
            bollinger_k: default_bollinger_k(),
            volatility_period: default_volatility_period(),
            output_dir: default_output_dir(),
            symbol_meta: MetaTable::default(),
        }
    }
}

impl MonitorConfig {
    /// Reject invalid configuration up front, before the scheduler runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::EmptyWatchlist);
        }
        for (index, symbol) in self.symbols.iter().enumerate() {
            if symbol.trim().is_empty() {
                return Err(ConfigError::BlankSymbol { index });
            }
        }
        if self.update_interval_secs == 0 {
            return Err(ConfigError::NonPositiveInterval);
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::NonPositiveTimeout);
        }
        if self.retention_cap == 0 {
            return Err(ConfigError::ZeroRetention);
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::ZeroParallelism);
        }
        if !(self.annualization_factor > 0.0) {
            return Err(ConfigError::NonPositiveAnnualization);
        }

        let periods: &[(&'static str, usize)] = &[
            ("ema", self.ema_period),
            ("rsi", self.rsi_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("bollinger", self.bollinger_period),
            ("volatility", self.volatility_period),
        ];
        for &(name, period) in periods {
            if period == 0 {
                return Err(ConfigError::NonPositivePeriod { name });
            }
        }
        if self.sma_periods.iter().any(|&p| p == 0) {
            return Err(ConfigError::NonPositivePeriod { name: "sma" });
        }
        if self.macd_fast >= self.macd_slow {
            return Err(ConfigError::MacdPeriodOrder {
                fast: self.macd_fast,
                slow: self.macd_slow,
            });
        }

        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Effective metadata table: built-in entries with config overrides on top.
    pub fn meta_table(&self) -> MetaTable {
        let mut table = MetaTable::builtin();
        table.merge(self.symbol_meta.clone());
        table
    }

    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read monitor config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse monitor config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            interval_secs = config.update_interval_secs,
            "monitor config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise monitor config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "monitor config saved (atomic)");
        Ok(())
    }
}
