// =============================================================================
// Moving Averages — SMA and EMA
// =============================================================================
//
// EMA formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The first EMA value is seeded with the SMA of the first `period` closes.
// =============================================================================

use crate::error::IndicatorError;

/// Arithmetic mean of the last `period` prices.
pub fn sma(closes: &[f64], period: usize) -> Result<f64, IndicatorError> {
    if period == 0 || closes.len() < period {
        return Err(IndicatorError::InsufficientData {
            required: period.max(1),
            actual: closes.len(),
        });
    }

    let window = &closes[closes.len() - period..];
    Ok(window.iter().sum::<f64>() / period as f64)
}

/// Most recent EMA value for the given `period`.
pub fn ema(closes: &[f64], period: usize) -> Result<f64, IndicatorError> {
    let series = ema_series(closes, period);
    series
        .last()
        .copied()
        .ok_or(IndicatorError::InsufficientData {
            required: period.max(1),
            actual: closes.len(),
        })
}

/// Compute the EMA series for the given `closes` and look-back `period`.
///
/// Each output element corresponds to a close starting at index `period - 1`
/// (the seed is the SMA of the first `period` closes). Returns an empty `Vec`
/// when the input is too short or the period is zero; non-finite intermediate
/// values truncate the series.
pub fn ema_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period + 1) as f64;

    // Seed: SMA of the first `period` values.
    let seed: f64 = closes[..period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(closes.len() - period + 1);
    result.push(seed);

    let mut prev = seed;
    for &close in &closes[period..] {
        let value = close * multiplier + prev * (1.0 - multiplier);
        if !value.is_finite() {
            // Downstream consumers should not trust a broken series.
            break;
        }
        result.push(value);
        prev = value;
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_known_value() {
        // The canonical five-point series.
        let closes = [100.0, 102.0, 101.0, 105.0, 103.0];
        let value = sma(&closes, 5).unwrap();
        assert!((value - 102.2).abs() < 1e-10, "got {value}");
    }

    #[test]
    fn sma_uses_most_recent_window() {
        let closes = [1.0, 2.0, 3.0, 4.0];
        assert!((sma(&closes, 2).unwrap() - 3.5).abs() < 1e-10);
    }

    #[test]
    fn sma_insufficient_data() {
        let closes = [1.0, 2.0];
        assert_eq!(
            sma(&closes, 5),
            Err(IndicatorError::InsufficientData {
                required: 5,
                actual: 2
            })
        );
    }

    #[test]
    fn sma_period_zero() {
        assert!(sma(&[1.0, 2.0], 0).is_err());
    }

    #[test]
    fn ema_series_empty_input() {
        assert!(ema_series(&[], 5).is_empty());
    }

    #[test]
    fn ema_series_period_equals_length() {
        let closes = [2.0, 4.0, 6.0];
        let series = ema_series(&closes, 3);
        assert_eq!(series.len(), 1);
        // Seed is the SMA = (2+4+6)/3 = 4.0
        assert!((series[0] - 4.0).abs() < 1e-10);
    }

    #[test]
    fn ema_series_known_recurrence() {
        // 5-period EMA of [1..10]: seed SMA = 3.0, multiplier = 2/6.
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let series = ema_series(&closes, 5);
        assert_eq!(series.len(), 6);

        let mult = 2.0 / 6.0;
        let mut expected = 3.0;
        for (i, &c) in closes[5..].iter().enumerate() {
            expected = c * mult + expected * (1.0 - mult);
            assert!(
                (series[i + 1] - expected).abs() < 1e-10,
                "index {i}: got {}, expected {expected}",
                series[i + 1]
            );
        }
    }

    #[test]
    fn ema_series_truncates_on_nan() {
        let closes = [1.0, 2.0, 3.0, f64::NAN, 5.0];
        let series = ema_series(&closes, 3);
        // Seed only: the NaN close poisons the next value, which is dropped.
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn ema_latest_matches_series_tail() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let series = ema_series(&closes, 10);
        let latest = ema(&closes, 10).unwrap();
        assert!((latest - series.last().unwrap()).abs() < 1e-12);
    }

    #[test]
    fn ema_insufficient_data() {
        assert_eq!(
            ema(&[1.0, 2.0], 5),
            Err(IndicatorError::InsufficientData {
                required: 5,
                actual: 2
            })
        );
    }
}
