// =============================================================================
// Volatility & Returns
// =============================================================================
//
// Rolling volatility is the sample standard deviation of period-over-period
// percentage returns, optionally scaled by √annualization_factor for an
// annualised figure (252 trading periods by default at the config level).
// =============================================================================

use crate::error::IndicatorError;

/// Period-over-period fractional returns: `r_t = p_t / p_{t-1} − 1`.
///
/// Pairs with a zero or non-finite base are skipped.
pub fn pct_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter_map(|w| {
            if w[0] != 0.0 && w[0].is_finite() && w[1].is_finite() {
                Some(w[1] / w[0] - 1.0)
            } else {
                None
            }
        })
        .collect()
}

/// Sample standard deviation of the `period` most recent percentage returns.
///
/// Needs `period + 1` closes (one extra to form the first return) and at
/// least 2 returns for a sample deviation.
pub fn volatility(closes: &[f64], period: usize) -> Result<f64, IndicatorError> {
    if period < 2 || closes.len() < period + 1 {
        return Err(IndicatorError::InsufficientData {
            required: period.max(2) + 1,
            actual: closes.len(),
        });
    }

    let returns = pct_returns(&closes[closes.len() - (period + 1)..]);
    if returns.len() < 2 {
        return Err(IndicatorError::InsufficientData {
            required: period + 1,
            actual: closes.len(),
        });
    }

    Ok(sample_std_dev(&returns))
}

/// Annualised volatility: `volatility(period) * sqrt(factor)`.
pub fn annualized_volatility(
    closes: &[f64],
    period: usize,
    factor: f64,
) -> Result<f64, IndicatorError> {
    Ok(volatility(closes, period)? * factor.sqrt())
}

/// Cumulative return over the window: `(last − first) / first`.
///
/// Signals `InsufficientData` when the window has fewer than 2 points or the
/// first price is zero (a zero base gives no meaningful return).
pub fn period_return(closes: &[f64]) -> Result<f64, IndicatorError> {
    if closes.len() < 2 {
        return Err(IndicatorError::InsufficientData {
            required: 2,
            actual: closes.len(),
        });
    }

    let first = closes[0];
    let last = closes[closes.len() - 1];
    if first == 0.0 {
        return Err(IndicatorError::InsufficientData {
            required: 2,
            actual: closes.len(),
        });
    }

    Ok((last - first) / first)
}

/// Sample standard deviation (n − 1 divisor). Caller guarantees `len >= 2`.
pub(crate) fn sample_std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}
