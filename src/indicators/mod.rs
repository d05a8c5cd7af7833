// =============================================================================
// Indicator Engine
// =============================================================================
//
// Pure, side-effect-free implementations of the technical indicators computed
// per watchlist symbol. Every function takes an ordered price slice and
// signals `InsufficientData` on short windows, so a thin history degrades the
// indicator set instead of aborting it.
// =============================================================================

pub mod bollinger;
pub mod ma;
pub mod macd;
pub mod rsi;
pub mod volatility;

pub use bollinger::{bollinger, BollingerBands};
pub use ma::{ema, ema_series, sma};
pub use macd::{macd, MacdResult};
pub use rsi::{rsi, rsi_series, rsi_zone};
pub use volatility::{annualized_volatility, pct_returns, period_return, volatility};

pub(crate) use volatility::sample_std_dev;

use std::collections::BTreeMap;

use crate::config::MonitorConfig;
use crate::error::IndicatorError;

// =============================================================================
// IndicatorParams
// =============================================================================

/// Periods and multipliers for one indicator-set computation.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    pub sma_periods: Vec<usize>,
    pub ema_period: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_k: f64,
    pub volatility_period: usize,
}

impl IndicatorParams {
    pub fn from_config(cfg: &MonitorConfig) -> Self {
        Self {
            sma_periods: cfg.sma_periods.clone(),
            ema_period: cfg.ema_period,
            rsi_period: cfg.rsi_period,
            macd_fast: cfg.macd_fast,
            macd_slow: cfg.macd_slow,
            macd_signal: cfg.macd_signal,
            bollinger_period: cfg.bollinger_period,
            bollinger_k: cfg.bollinger_k,
            volatility_period: cfg.volatility_period,
        }
    }
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

// =============================================================================
// IndicatorSet
// =============================================================================

/// Every configured indicator evaluated over one price window.
///
/// Each entry is its own `Result`: a window long enough for SMA(5) but too
/// short for MACD(12,26,9) yields a partially-populated set, with the failing
/// entries carrying the reason. Recomputing over the same window yields an
/// identical set — nothing here reads the clock or mutates state.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    /// One entry per configured SMA period, keyed by period.
    pub sma: BTreeMap<usize, Result<f64, IndicatorError>>,
    pub ema: Result<f64, IndicatorError>,
    pub rsi: Result<f64, IndicatorError>,
    pub macd: Result<MacdResult, IndicatorError>,
    pub bollinger: Result<BollingerBands, IndicatorError>,
    pub volatility: Result<f64, IndicatorError>,
    pub period_return: Result<f64, IndicatorError>,
}

impl IndicatorSet {
    /// Evaluate every indicator in `params` over `closes` (oldest-first).
    pub fn compute(closes: &[f64], params: &IndicatorParams) -> Self {
        let sma_map = params
            .sma_periods
            .iter()
            .map(|&p| (p, sma(closes, p)))
            .collect();

        Self {
            sma: sma_map,
            ema: ema(closes, params.ema_period),
            rsi: rsi(closes, params.rsi_period),
            macd: macd(closes, params.macd_fast, params.macd_slow, params.macd_signal),
            bollinger: bollinger(closes, params.bollinger_period, params.bollinger_k),
            volatility: volatility(closes, params.volatility_period),
            period_return: period_return(closes),
        }
    }

    /// Indicators that could not be computed, with the reason for each.
    /// Used for degraded-report logging and the cycle summary.
    pub fn unavailable(&self) -> Vec<(String, IndicatorError)> {
        let mut missing = Vec::new();

        for (&period, result) in &self.sma {
            if let Err(e) = result {
                missing.push((format!("sma_{period}"), e.clone()));
            }
        }
        if let Err(e) = &self.ema {
            missing.push(("ema".to_string(), e.clone()));
        }
        if let Err(e) = &self.rsi {
            missing.push(("rsi".to_string(), e.clone()));
        }
        if let Err(e) = &self.macd {
            missing.push(("macd".to_string(), e.clone()));
        }
        if let Err(e) = &self.bollinger {
            missing.push(("bollinger".to_string(), e.clone()));
        }
        if let Err(e) = &self.volatility {
            missing.push(("volatility".to_string(), e.clone()));
        }
        if let Err(e) = &self.period_return {
            missing.push(("period_return".to_string(), e.clone()));
        }

        missing
    }

    /// True when every configured indicator produced a value.
    pub fn is_complete(&self) -> bool {
        self.unavailable().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn long_series() -> Vec<f64> {
        (0..120)
            .map(|i| 100.0 + (i as f64 * 0.35).sin() * 4.0 + i as f64 * 0.01)
            .collect()
    }

    #[test]
    fn full_window_computes_everything() {
        let closes = long_series();
        let set = IndicatorSet::compute(&closes, &IndicatorParams::default());
        assert!(set.is_complete(), "missing: {:?}", set.unavailable());
        assert!(set.sma.contains_key(&5));
        assert!(set.sma.contains_key(&20));
        assert!(set.sma.contains_key(&50));
    }

    #[test]
    fn short_window_degrades_per_indicator() {
        // Six points: SMA(5) and period return work, the rest cannot.
        let closes = [100.0, 102.0, 101.0, 105.0, 103.0, 104.0];
        let set = IndicatorSet::compute(&closes, &IndicatorParams::default());

        assert!(set.sma[&5].is_ok());
        assert!(set.sma[&20].is_err());
        assert!(set.sma[&50].is_err());
        assert!(set.rsi.is_err());
        assert!(set.macd.is_err());
        assert!(set.period_return.is_ok());

        let missing: Vec<String> = set.unavailable().into_iter().map(|(n, _)| n).collect();
        assert!(missing.contains(&"sma_20".to_string()));
        assert!(missing.contains(&"rsi".to_string()));
        assert!(!missing.contains(&"sma_5".to_string()));
    }

    #[test]
    fn recomputation_is_identical() {
        let closes = long_series();
        let params = IndicatorParams::default();
        let a = IndicatorSet::compute(&closes, &params);
        let b = IndicatorSet::compute(&closes, &params);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_window_reports_all_unavailable() {
        let set = IndicatorSet::compute(&[], &IndicatorParams::default());
        assert!(!set.is_complete());
        // 3 SMAs + ema, rsi, macd, bollinger, volatility, period_return.
        assert_eq!(set.unavailable().len(), 9);
    }
}
