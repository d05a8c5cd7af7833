// =============================================================================
// Bollinger Bands
// =============================================================================
//
// A volatility envelope around a simple moving average: the middle band is
// SMA(period), the upper and lower bands sit `k` standard deviations away.
// The deviation uses the SAMPLE standard deviation (n − 1 divisor), matching
// the volatility functions elsewhere in this crate.
//
// Width = (upper − lower) / middle * 100, a normalised band-width measure.
// =============================================================================

use crate::error::IndicatorError;

/// Result of a Bollinger Band calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub width: f64,
}

/// Calculate Bollinger Bands over the last `period` closes.
///
/// `period` must be at least 2 for a sample deviation to exist; shorter
/// windows signal `InsufficientData`.
pub fn bollinger(closes: &[f64], period: usize, k: f64) -> Result<BollingerBands, IndicatorError> {
    if period < 2 || closes.len() < period {
        return Err(IndicatorError::InsufficientData {
            required: period.max(2),
            actual: closes.len(),
        });
    }

    let window = &closes[closes.len() - period..];
    let middle = window.iter().sum::<f64>() / period as f64;

    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / (period - 1) as f64;
    let std_dev = variance.sqrt();

    let upper = middle + k * std_dev;
    let lower = middle - k * std_dev;
    let width = if middle != 0.0 {
        (upper - lower) / middle * 100.0
    } else {
        0.0
    };

    Ok(BollingerBands {
        upper,
        middle,
        lower,
        width,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_bracket_the_mean() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let bb = bollinger(&closes, 20, 2.0).unwrap();
        assert!(bb.upper > bb.middle);
        assert!(bb.lower < bb.middle);
        assert!(bb.width > 0.0);
    }

    #[test]
    fn middle_band_is_sma() {
        let closes = [100.0, 102.0, 101.0, 105.0, 103.0];
        let bb = bollinger(&closes, 5, 2.0).unwrap();
        assert!((bb.middle - 102.2).abs() < 1e-10);
    }

    #[test]
    fn sample_deviation_known_value() {
        // Window [2, 4, 4, 4, 5, 5, 7, 9]: mean 5, sample variance 32/7.
        let closes = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bb = bollinger(&closes, 8, 1.0).unwrap();
        let expected_sd = (32.0_f64 / 7.0).sqrt();
        assert!((bb.upper - (5.0 + expected_sd)).abs() < 1e-10);
        assert!((bb.lower - (5.0 - expected_sd)).abs() < 1e-10);
    }

    #[test]
    fn insufficient_data() {
        let closes = [1.0, 2.0, 3.0];
        assert_eq!(
            bollinger(&closes, 20, 2.0),
            Err(IndicatorError::InsufficientData {
                required: 20,
                actual: 3
            })
        );
    }

    #[test]
    fn flat_series_collapses_bands() {
        let closes = vec![100.0; 20];
        let bb = bollinger(&closes, 20, 2.0).unwrap();
        assert!((bb.upper - bb.lower).abs() < 1e-10);
        assert!(bb.width.abs() < 1e-10);
    }

    #[test]
    fn period_one_rejected() {
        // A single point has no sample deviation.
        assert!(bollinger(&[100.0, 101.0], 1, 2.0).is_err());
    }
}
