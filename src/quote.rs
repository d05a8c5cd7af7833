// =============================================================================
// Quote — single point-in-time market snapshot for one symbol
// =============================================================================
//
// Optional fields reflect what providers actually return: thinly-traded or
// exotic instruments often lack a previous close, volume, or market cap.
// Derived values (change, change_percent) are computed on demand and signal a
// missing base instead of guessing a default.
// =============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FetchError, IndicatorError};

/// Immutable market snapshot for one symbol at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,

    /// Acquisition instant, UTC. Unique per symbol within the buffer.
    pub timestamp: DateTime<Utc>,

    /// Last traded price. Always > 0 for a quote that passed adapter
    /// validation.
    pub price: f64,

    #[serde(default)]
    pub previous_close: Option<f64>,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub volume: Option<u64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub fifty_two_week_high: Option<f64>,
    #[serde(default)]
    pub fifty_two_week_low: Option<f64>,
}

impl Quote {
    /// Absolute change versus the previous close.
    ///
    /// A zero or absent previous close yields `MissingField("previous_close")`.
    pub fn change(&self) -> Result<f64, IndicatorError> {
        match self.previous_close {
            Some(pc) if pc != 0.0 => Ok(self.price - pc),
            _ => Err(IndicatorError::MissingField {
                field: "previous_close",
            }),
        }
    }

    /// Percentage change versus the previous close.
    ///
    /// Same missing-base rule as [`change`](Self::change) — never a division
    /// by zero.
    pub fn change_percent(&self) -> Result<f64, IndicatorError> {
        match self.previous_close {
            Some(pc) if pc != 0.0 => Ok((self.price - pc) / pc * 100.0),
            _ => Err(IndicatorError::MissingField {
                field: "previous_close",
            }),
        }
    }

    /// Intraday range rendered as `"low - high"` when both bounds exist.
    pub fn day_range(&self) -> Option<String> {
        match (self.low, self.high) {
            (Some(lo), Some(hi)) => Some(format!("{lo:.2} - {hi:.2}")),
            _ => None,
        }
    }
}

// =============================================================================
// QuoteSource — the acquisition seam
// =============================================================================

/// Capability to fetch the current quote for a single symbol.
///
/// Implementations must not retry internally — retry policy belongs to the
/// scheduler. Failures are classified so the scheduler can decide what to do
/// with each kind.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, FetchError>;
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_quote(price: f64, previous_close: Option<f64>) -> Quote {
        Quote {
            symbol: "AAPL".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap(),
            price,
            previous_close,
            open: Some(price - 1.0),
            high: Some(price + 2.0),
            low: Some(price - 2.0),
            volume: Some(1_000_000),
            market_cap: Some(2.5e12),
            fifty_two_week_high: Some(price + 30.0),
            fifty_two_week_low: Some(price - 40.0),
        }
    }

    #[test]
    fn change_and_percent_from_previous_close() {
        let q = sample_quote(103.0, Some(100.0));
        assert!((q.change().unwrap() - 3.0).abs() < 1e-10);
        assert!((q.change_percent().unwrap() - 3.0).abs() < 1e-10);
    }

    #[test]
    fn change_percent_negative_move() {
        let q = sample_quote(95.0, Some(100.0));
        assert!((q.change_percent().unwrap() + 5.0).abs() < 1e-10);
    }

    #[test]
    fn missing_previous_close_signals_missing_field() {
        let q = sample_quote(103.0, None);
        assert_eq!(
            q.change(),
            Err(IndicatorError::MissingField {
                field: "previous_close"
            })
        );
        assert_eq!(
            q.change_percent(),
            Err(IndicatorError::MissingField {
                field: "previous_close"
            })
        );
    }

    #[test]
    fn zero_previous_close_signals_missing_field() {
        // Zero base means a division by zero — must signal, not compute.
        let q = sample_quote(103.0, Some(0.0));
        assert!(q.change_percent().is_err());
    }

    #[test]
    fn day_range_renders_both_bounds() {
        let q = sample_quote(103.0, Some(100.0));
        assert_eq!(q.day_range().unwrap(), "101.00 - 105.00");
    }

    #[test]
    fn day_range_none_when_bound_missing() {
        let mut q = sample_quote(103.0, Some(100.0));
        q.low = None;
        assert!(q.day_range().is_none());
    }
}
