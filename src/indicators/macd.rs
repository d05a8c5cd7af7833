// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   MACD line  = EMA(fast) − EMA(slow)
//   signal     = EMA(signal_period) of the MACD line
//   histogram  = MACD − signal
//
// The fast and slow EMA series are aligned on the slow seed index, so the
// MACD line has one value per close from index `slow - 1` onward. Computing
// the signal line then needs at least `signal_period` MACD values, giving a
// total requirement of `slow + signal_period − 1` closes.
// =============================================================================

use crate::error::IndicatorError;
use crate::indicators::ma::ema_series;

/// The MACD triple at the most recent close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdResult {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Compute the MACD triple for the most recent close.
///
/// `fast` must be smaller than `slow`; configuration validation enforces
/// that before this is ever called with live parameters.
pub fn macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Result<MacdResult, IndicatorError> {
    let required = slow + signal_period.max(1) - 1;
    if fast == 0 || slow == 0 || signal_period == 0 || fast >= slow || closes.len() < required {
        return Err(IndicatorError::InsufficientData {
            required: required.max(2),
            actual: closes.len(),
        });
    }

    let line = macd_line(closes, fast, slow);
    let signal_series = ema_series(&line, signal_period);

    match (line.last(), signal_series.last()) {
        (Some(&m), Some(&s)) => Ok(MacdResult {
            macd: m,
            signal: s,
            histogram: m - s,
        }),
        _ => Err(IndicatorError::InsufficientData {
            required,
            actual: closes.len(),
        }),
    }
}

/// MACD line series: one value per close from index `slow - 1` onward.
fn macd_line(closes: &[f64], fast: usize, slow: usize) -> Vec<f64> {
    let fast_series = ema_series(closes, fast);
    let slow_series = ema_series(closes, slow);

    // fast_series starts at index fast-1, slow_series at slow-1; drop the
    // fast values that precede the slow seed.
    let offset = slow - fast;
    fast_series
        .iter()
        .skip(offset)
        .zip(slow_series.iter())
        .map(|(f, s)| f - s)
        .collect()
}
