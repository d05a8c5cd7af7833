// =============================================================================
// Cross-Sectional Analytics
// =============================================================================
//
// Views that cut across the whole watchlist rather than one symbol at a
// time: correlation of aligned return series, metric averages by group,
// and the risk/return plane.
// =============================================================================

pub mod correlation;
pub mod group;
pub mod risk_return;

pub use correlation::{correlation_matrix, pearson, CorrelationMatrix};
pub use group::{group_averages, GroupAverage};
pub use risk_return::{risk_return_profile, RiskReturnPoint};

use chrono::{DateTime, Utc};

use crate::buffer::QuoteBuffer;
use crate::error::IndicatorError;

/// Correlation over buffered history: one series per symbol from its most
/// recent `lookback` quotes.
pub fn matrix_from_buffer(
    buffer: &QuoteBuffer,
    symbols: &[String],
    lookback: usize,
) -> CorrelationMatrix {
    let series: Vec<(String, Vec<(DateTime<Utc>, f64)>)> = symbols
        .iter()
        .map(|symbol| {
            let points = buffer
                .window(symbol, lookback)
                .iter()
                .map(|q| (q.timestamp, q.price))
                .collect();
            (symbol.clone(), points)
        })
        .collect();
    correlation_matrix(&series)
}

/// Risk/return points over buffered history.
pub fn risk_return_from_buffer(
    buffer: &QuoteBuffer,
    symbols: &[String],
    lookback: usize,
    annualization_factor: f64,
) -> (Vec<RiskReturnPoint>, Vec<(String, IndicatorError)>) {
    let closes: Vec<(String, Vec<f64>)> = symbols
        .iter()
        .map(|symbol| (symbol.clone(), buffer.closes(symbol, lookback)))
        .collect();
    risk_return_profile(&closes, annualization_factor)
}
