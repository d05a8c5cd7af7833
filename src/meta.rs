// =============================================================================
// Symbol metadata — company name and sector lookup
// =============================================================================
//
// The chart endpoint carries prices, not company profiles, so name/sector
// pairs live in configuration. Unknown symbols fall back to the symbol itself
// and an "Unknown" sector so grouping and exports never fail on a missing
// entry.
// =============================================================================

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Static descriptive metadata for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SymbolMeta {
    pub name: String,
    pub sector: String,
}

/// Lookup table from symbol to metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaTable {
    #[serde(default)]
    entries: HashMap<String, SymbolMeta>,
}

impl MetaTable {
    pub fn new(entries: HashMap<String, SymbolMeta>) -> Self {
        Self { entries }
    }

    /// Built-in table covering the default watchlist.
    pub fn builtin() -> Self {
        let mut entries = HashMap::new();
        let known = [
            ("AAPL", "Apple Inc.", "Technology"),
            ("GOOGL", "Alphabet Inc.", "Technology"),
            ("MSFT", "Microsoft Corporation", "Technology"),
            ("AMZN", "Amazon.com Inc.", "Consumer Discretionary"),
            ("TSLA", "Tesla Inc.", "Consumer Discretionary"),
            ("META", "Meta Platforms Inc.", "Technology"),
            ("NVDA", "NVIDIA Corporation", "Semiconductors"),
            ("JPM", "JPMorgan Chase & Co.", "Financial Services"),
            ("V", "Visa Inc.", "Financial Services"),
            ("JNJ", "Johnson & Johnson", "Healthcare"),
        ];
        for (symbol, name, sector) in known {
            entries.insert(
                symbol.to_string(),
                SymbolMeta {
                    name: name.to_string(),
                    sector: sector.to_string(),
                },
            );
        }
        Self { entries }
    }

    /// Company name, falling back to the symbol itself.
    pub fn name(&self, symbol: &str) -> String {
        self.entries
            .get(symbol)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| symbol.to_string())
    }

    /// Sector, falling back to "Unknown".
    pub fn sector(&self, symbol: &str) -> String {
        self.entries
            .get(symbol)
            .map(|m| m.sector.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Merge `other` over this table. Entries in `other` win.
    pub fn merge(&mut self, other: MetaTable) {
        self.entries.extend(other.entries);
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_default_watchlist() {
        let table = MetaTable::builtin();
        assert_eq!(table.sector("AAPL"), "Technology");
        assert_eq!(table.name("MSFT"), "Microsoft Corporation");
        assert_eq!(table.sector("AMZN"), "Consumer Discretionary");
    }

    #[test]
    fn unknown_symbol_falls_back() {
        let table = MetaTable::builtin();
        assert_eq!(table.name("ZZZZ"), "ZZZZ");
        assert_eq!(table.sector("ZZZZ"), "Unknown");
    }

    #[test]
    fn merge_prefers_incoming_entries() {
        let mut table = MetaTable::builtin();
        let mut extra = HashMap::new();
        extra.insert(
            "AAPL".to_string(),
            SymbolMeta {
                name: "Apple".to_string(),
                sector: "Hardware".to_string(),
            },
        );
        table.merge(MetaTable::new(extra));
        assert_eq!(table.sector("AAPL"), "Hardware");
        // Untouched entries survive.
        assert_eq!(table.sector("MSFT"), "Technology");
    }
}
