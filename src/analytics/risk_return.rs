// =============================================================================
// Risk / Return Profile
// =============================================================================
//
// One (annualized volatility, annualized return) point per symbol, computed
// from the full close series each symbol has buffered. Symbols without
// enough history are reported alongside the points instead of vanishing.
// =============================================================================

use crate::error::IndicatorError;
use crate::indicators::{pct_returns, sample_std_dev};

/// A single symbol's position on the risk/return plane.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskReturnPoint {
    pub symbol: String,
    /// Sample stdev of period returns, scaled by sqrt of the
    /// annualization factor.
    pub annualized_volatility: f64,
    /// Mean period return, scaled by the annualization factor.
    pub annualized_return: f64,
}

/// Compute risk/return points for every symbol with at least 3 closes
/// (2 returns). The second list carries the symbols that fell short.
pub fn risk_return_profile(
    closes_per_symbol: &[(String, Vec<f64>)],
    annualization_factor: f64,
) -> (Vec<RiskReturnPoint>, Vec<(String, IndicatorError)>) {
    let mut points = Vec::new();
    let mut skipped = Vec::new();

    for (symbol, closes) in closes_per_symbol {
        let returns = pct_returns(closes);
        if returns.len() < 2 {
            skipped.push((
                symbol.clone(),
                IndicatorError::InsufficientData {
                    required: 3,
                    actual: closes.len(),
                },
            ));
            continue;
        }

        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        points.push(RiskReturnPoint {
            symbol: symbol.clone(),
            annualized_volatility: sample_std_dev(&returns) * annualization_factor.sqrt(),
            annualized_return: mean * annualization_factor,
        });
    }

    (points, skipped)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_growth_has_zero_volatility() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let series = vec![("UP".to_string(), closes)];

        let (points, skipped) = risk_return_profile(&series, 252.0);
        assert!(skipped.is_empty());
        assert_eq!(points.len(), 1);
        assert!(points[0].annualized_volatility.abs() < 1e-9);
        assert!((points[0].annualized_return - 0.01 * 252.0).abs() < 1e-9);
    }

    #[test]
    fn short_series_reported_not_dropped() {
        let series = vec![
            ("OK".to_string(), vec![100.0, 101.0, 99.0, 102.0]),
            ("THIN".to_string(), vec![100.0, 101.0]),
        ];

        let (points, skipped) = risk_return_profile(&series, 252.0);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].symbol, "OK");
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].0, "THIN");
        assert!(matches!(
            skipped[0].1,
            IndicatorError::InsufficientData {
                required: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn annualization_scales_volatility_by_sqrt() {
        let closes = vec![100.0, 102.0, 99.0, 103.0, 101.0, 104.0];
        let series = vec![("X".to_string(), closes)];

        let (daily, _) = risk_return_profile(&series, 1.0);
        let (annual, _) = risk_return_profile(&series, 252.0);
        let ratio = annual[0].annualized_volatility / daily[0].annualized_volatility;
        assert!((ratio - 252.0f64.sqrt()).abs() < 1e-9);
    }
}
