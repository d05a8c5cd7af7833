// =============================================================================
// Cross-Symbol Correlation
// =============================================================================
//
// Pearson correlation over aligned return series. Alignment is explicit:
// every candidate symbol's (timestamp, price) points are cut down to the
// intersection of timestamps common to all candidates, and returns are taken
// between consecutive aligned points. Symbols that cannot contribute at
// least 2 aligned points are excluded from the matrix and reported, never
// silently dropped.
//
// A pair whose aligned returns have zero variance has no defined correlation;
// its cell is `None` rather than a fabricated number.
// =============================================================================

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

/// Correlation matrix over the included symbols.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    /// Included symbols, in input order. Row/column `i` belongs to
    /// `symbols[i]`.
    pub symbols: Vec<String>,
    /// N×N, symmetric, `Some(1.0)` on the diagonal. `None` marks a pair with
    /// no defined correlation (zero variance or too few aligned returns).
    pub matrix: Vec<Vec<Option<f64>>>,
    /// Symbols left out of the matrix, with the number of aligned points
    /// each could contribute.
    pub excluded: Vec<(String, usize)>,
    /// Number of common timestamps the included series were aligned on.
    pub aligned_len: usize,
}

impl CorrelationMatrix {
    /// Cell lookup by symbol pair.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.symbols.iter().position(|s| s == a)?;
        let j = self.symbols.iter().position(|s| s == b)?;
        self.matrix[i][j]
    }
}

/// Pearson correlation coefficient between two equal-length series.
///
/// Returns `None` on a length mismatch, fewer than 2 points, or zero
/// variance in either series.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;

    for i in 0..x.len() {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    let value = cov / (var_x.sqrt() * var_y.sqrt());
    // Floating point can push |r| a hair past 1.
    Some(value.clamp(-1.0, 1.0))
}

/// Build the correlation matrix from per-symbol timestamped prices.
///
/// `series` holds one `(symbol, points)` entry per candidate, points ordered
/// by timestamp. Candidates with fewer than 2 points on the common-timestamp
/// intersection are excluded and reported.
pub fn correlation_matrix(series: &[(String, Vec<(DateTime<Utc>, f64)>)]) -> CorrelationMatrix {
    // Candidates with fewer than 2 points of their own can never align 2.
    let mut excluded: Vec<(String, usize)> = Vec::new();
    let mut candidates: Vec<(&String, &Vec<(DateTime<Utc>, f64)>)> = Vec::new();
    for (symbol, points) in series {
        if points.len() < 2 {
            excluded.push((symbol.clone(), points.len()));
        } else {
            candidates.push((symbol, points));
        }
    }

    // Intersection of timestamps across the remaining candidates.
    let mut common: Option<BTreeSet<DateTime<Utc>>> = None;
    for (_, points) in &candidates {
        let stamps: BTreeSet<DateTime<Utc>> = points.iter().map(|(t, _)| *t).collect();
        common = Some(match common {
            Some(acc) => acc.intersection(&stamps).copied().collect(),
            None => stamps,
        });
    }
    let common = common.unwrap_or_default();
    let aligned_len = common.len();

    if aligned_len < 2 {
        // Nobody can contribute 2 aligned points; the matrix is empty and
        // every candidate is reported with what it had.
        for (symbol, _) in candidates {
            excluded.push((symbol.clone(), aligned_len));
        }
        return CorrelationMatrix {
            symbols: Vec::new(),
            matrix: Vec::new(),
            excluded,
            aligned_len,
        };
    }

    // Aligned prices -> period-over-period returns per included symbol.
    let mut symbols = Vec::with_capacity(candidates.len());
    let mut returns: Vec<Vec<f64>> = Vec::with_capacity(candidates.len());
    for (symbol, points) in candidates {
        let aligned: Vec<f64> = points
            .iter()
            .filter(|(t, _)| common.contains(t))
            .map(|(_, p)| *p)
            .collect();
        let r: Vec<f64> = aligned
            .windows(2)
            .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
            .collect();
        symbols.push(symbol.clone());
        returns.push(r);
    }

    let n = symbols.len();
    let mut matrix = vec![vec![None; n]; n];
    for i in 0..n {
        matrix[i][i] = Some(1.0);
        for j in (i + 1)..n {
            let cell = pearson(&returns[i], &returns[j]);
            matrix[i][j] = cell;
            matrix[j][i] = cell;
        }
    }

    CorrelationMatrix {
        symbols,
        matrix,
        excluded,
        aligned_len,
    }
}
