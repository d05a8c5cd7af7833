use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;

use crate::quote::Quote;

// ---------------------------------------------------------------------------
// QuoteBuffer -- thread-safe, deduplicated time series per symbol
// ---------------------------------------------------------------------------

/// Thread-safe store of the most recent quotes per symbol.
///
/// Each symbol's series is kept strictly ascending by timestamp with unique
/// timestamps: re-appending a quote for an instant already stored is a no-op,
/// so re-fetching the same instant never produces a duplicate row. Once a
/// series exceeds `retention_cap` the oldest entries are evicted.
///
/// The buffer is the sole mutator of a symbol's series; concurrent fetch
/// tasks only ever call `append`, which serialises through the write lock.
pub struct QuoteBuffer {
    series: RwLock<HashMap<String, VecDeque<Quote>>>,
    retention_cap: usize,
}

impl QuoteBuffer {
    /// Create a buffer retaining at most `retention_cap` quotes per symbol.
    pub fn new(retention_cap: usize) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            retention_cap,
        }
    }

    /// Insert `quote` into its symbol's series.
    ///
    /// Returns `true` if the quote was inserted, `false` when a quote with
    /// the same timestamp was already present (idempotent no-op). Arrivals
    /// out of timestamp order are placed at their sorted position.
    pub fn append(&self, quote: Quote) -> bool {
        let mut map = self.series.write();
        let ring = map
            .entry(quote.symbol.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.retention_cap.min(64)));

        match ring.binary_search_by(|q| q.timestamp.cmp(&quote.timestamp)) {
            Ok(_) => false,
            Err(pos) => {
                ring.insert(pos, quote);
                while ring.len() > self.retention_cap {
                    ring.pop_front();
                }
                true
            }
        }
    }

    /// The most recent `lookback` quotes for `symbol`, oldest-first. Returns
    /// fewer entries when history is shorter than `lookback`.
    pub fn window(&self, symbol: &str, lookback: usize) -> Vec<Quote> {
        let map = self.series.read();
        match map.get(symbol) {
            Some(ring) => {
                let start = ring.len().saturating_sub(lookback);
                ring.iter().skip(start).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// The full retained series for `symbol`, oldest-first.
    pub fn series(&self, symbol: &str) -> Vec<Quote> {
        let map = self.series.read();
        map.get(symbol)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The most recent quote for `symbol`, if any.
    pub fn latest(&self, symbol: &str) -> Option<Quote> {
        let map = self.series.read();
        map.get(symbol).and_then(|ring| ring.back().cloned())
    }

    /// The most recent `lookback` prices for `symbol`, oldest-first.
    pub fn closes(&self, symbol: &str, lookback: usize) -> Vec<f64> {
        let map = self.series.read();
        match map.get(symbol) {
            Some(ring) => {
                let start = ring.len().saturating_sub(lookback);
                ring.iter().skip(start).map(|q| q.price).collect()
            }
            None => Vec::new(),
        }
    }

    /// Number of retained quotes for `symbol`.
    pub fn len(&self, symbol: &str) -> usize {
        let map = self.series.read();
        map.get(symbol).map_or(0, VecDeque::len)
    }

    /// All symbols with at least one retained quote, sorted for determinism.
    pub fn symbols(&self) -> Vec<String> {
        let map = self.series.read();
        let mut symbols: Vec<String> = map.keys().cloned().collect();
        symbols.sort();
        symbols
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
