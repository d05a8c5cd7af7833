// =============================================================================
// Exporter
// =============================================================================
//
// Pure mapping of buffer + indicator state into flat rows for the sink.
// Four table shapes:
//   daily       — one wide row per symbol: latest quote, indicator set,
//                 company metadata, categorization buckets
//   historical  — one row per retained (symbol, timestamp) pair
//   summary     — one analyst-facing row per symbol
//   performance — per-symbol returns over several lookbacks plus retained
//                 price/volume extremes
//
// Nothing here recomputes indicator math beyond calling the engine once per
// symbol; missing values render as empty strings, never fabricated numbers.
// =============================================================================

use tracing::info;

use crate::buffer::QuoteBuffer;
use crate::config::MonitorConfig;
use crate::error::{IndicatorError, SinkError};
use crate::indicators::{
    pct_returns, period_return, rsi_zone, sample_std_dev, IndicatorParams, IndicatorSet,
};
use crate::meta::MetaTable;
use crate::quote::Quote;
use crate::sink::{Row, RowSink};

// =============================================================================
// Shapes
// =============================================================================

/// The documented output tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportShape {
    Daily,
    Historical,
    Summary,
    Performance,
}

impl ExportShape {
    pub const ALL: [ExportShape; 4] = [
        ExportShape::Daily,
        ExportShape::Historical,
        ExportShape::Summary,
        ExportShape::Performance,
    ];

    /// Sink table name.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Historical => "historical",
            Self::Summary => "summary",
            Self::Performance => "performance",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "historical" => Some(Self::Historical),
            "summary" => Some(Self::Summary),
            "performance" => Some(Self::Performance),
            _ => None,
        }
    }
}

// =============================================================================
// Exporter
// =============================================================================

/// Builds export rows from a buffer. Holds the indicator parameters and the
/// symbol metadata so row construction needs no other context.
pub struct Exporter {
    params: IndicatorParams,
    meta: MetaTable,
}

impl Exporter {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            params: IndicatorParams::from_config(config),
            meta: config.meta_table(),
        }
    }

    /// Rows for one shape. Symbols without any buffered history are omitted.
    pub fn rows(&self, shape: ExportShape, buffer: &QuoteBuffer) -> Vec<Row> {
        match shape {
            ExportShape::Daily => self.daily_rows(buffer),
            ExportShape::Historical => self.historical_rows(buffer),
            ExportShape::Summary => self.summary_rows(buffer),
            ExportShape::Performance => self.performance_rows(buffer),
        }
    }

    /// Build and append one shape to the sink. Returns rows written.
    pub fn export_to(
        &self,
        shape: ExportShape,
        buffer: &QuoteBuffer,
        sink: &dyn RowSink,
    ) -> Result<usize, SinkError> {
        let rows = self.rows(shape, buffer);
        let written = sink.append_rows(shape.table(), &rows)?;
        info!(table = shape.table(), rows = written, "export written");
        Ok(written)
    }

    /// Export every shape. Returns the total rows written.
    pub fn export_all(
        &self,
        buffer: &QuoteBuffer,
        sink: &dyn RowSink,
    ) -> Result<usize, SinkError> {
        let mut total = 0;
        for shape in ExportShape::ALL {
            total += self.export_to(shape, buffer, sink)?;
        }
        Ok(total)
    }

    // ── Daily ───────────────────────────────────────────────────────────

    fn daily_rows(&self, buffer: &QuoteBuffer) -> Vec<Row> {
        let mut rows = Vec::new();
        for symbol in buffer.symbols() {
            let series = buffer.series(&symbol);
            let Some(latest) = series.last() else {
                continue;
            };
            let closes: Vec<f64> = series.iter().map(|q| q.price).collect();
            let set = IndicatorSet::compute(&closes, &self.params);

            let mut row = Row::new();
            push_quote_columns(&mut row, latest);
            row.push("company_name", self.meta.name(&symbol));
            row.push("sector", self.meta.sector(&symbol));
            self.push_indicator_columns(&mut row, &set);
            self.push_category_columns(&mut row, latest, &series, &set);
            rows.push(row);
        }
        rows
    }

    fn push_indicator_columns(&self, row: &mut Row, set: &IndicatorSet) {
        for (period, value) in &set.sma {
            row.push(format!("sma_{period}"), fmt_result(value));
        }
        row.push("ema", fmt_result(&set.ema));
        row.push("rsi", fmt_result(&set.rsi));
        row.push(
            "rsi_zone",
            set.rsi.as_ref().map(|&v| rsi_zone(v)).unwrap_or_default(),
        );
        match &set.macd {
            Ok(m) => {
                row.push("macd", fmt_num(m.macd));
                row.push("macd_signal", fmt_num(m.signal));
                row.push("macd_histogram", fmt_num(m.histogram));
            }
            Err(_) => {
                row.push("macd", "");
                row.push("macd_signal", "");
                row.push("macd_histogram", "");
            }
        }
        match &set.bollinger {
            Ok(b) => {
                row.push("bollinger_upper", fmt_num(b.upper));
                row.push("bollinger_middle", fmt_num(b.middle));
                row.push("bollinger_lower", fmt_num(b.lower));
                row.push("bollinger_width", fmt_num(b.width));
            }
            Err(_) => {
                row.push("bollinger_upper", "");
                row.push("bollinger_middle", "");
                row.push("bollinger_lower", "");
                row.push("bollinger_width", "");
            }
        }
        // Return-based values exported as percentages.
        row.push(
            "volatility_pct",
            set.volatility
                .as_ref()
                .map(|v| fmt_num(v * 100.0))
                .unwrap_or_default(),
        );
        row.push(
            "period_return_pct",
            set.period_return
                .as_ref()
                .map(|v| fmt_num(v * 100.0))
                .unwrap_or_default(),
        );
    }

    fn push_category_columns(
        &self,
        row: &mut Row,
        latest: &Quote,
        series: &[Quote],
        set: &IndicatorSet,
    ) {
        row.push("price_category", categorize_price(latest.price));
        row.push(
            "change_category",
            latest
                .change_percent()
                .map(categorize_change)
                .unwrap_or("Unknown"),
        );
        let avg_volume = average_volume(series);
        row.push(
            "volume_category",
            match (latest.volume, avg_volume) {
                (Some(v), Some(avg)) => categorize_volume(v, avg),
                _ => "Unknown",
            },
        );
        row.push(
            "market_cap_category",
            latest
                .market_cap
                .map(categorize_market_cap)
                .unwrap_or("Unknown"),
        );
        row.push(
            "sector_category",
            categorize_sector(&self.meta.sector(&latest.symbol)),
        );
        row.push(
            "volatility_category",
            intraday_volatility(latest)
                .map(categorize_volatility)
                .unwrap_or(""),
        );
        row.push("trend", self.trend_label(latest.price, set));
    }

    /// UPTREND/DOWNTREND versus the mid-length configured SMA.
    fn trend_label(&self, price: f64, set: &IndicatorSet) -> &'static str {
        let period = self
            .params
            .sma_periods
            .get(1)
            .or_else(|| self.params.sma_periods.first());
        let Some(period) = period else {
            return "";
        };
        match set.sma.get(period) {
            Some(Ok(mean)) if price > *mean => "UPTREND",
            Some(Ok(mean)) if price < *mean => "DOWNTREND",
            Some(Ok(_)) => "FLAT",
            _ => "",
        }
    }

    // ── Historical ──────────────────────────────────────────────────────

    fn historical_rows(&self, buffer: &QuoteBuffer) -> Vec<Row> {
        let mut rows = Vec::new();
        for symbol in buffer.symbols() {
            for quote in buffer.series(&symbol) {
                let mut row = Row::new();
                push_quote_columns(&mut row, &quote);
                rows.push(row);
            }
        }
        rows
    }

    // ── Summary ─────────────────────────────────────────────────────────

    fn summary_rows(&self, buffer: &QuoteBuffer) -> Vec<Row> {
        let mut rows = Vec::new();
        for symbol in buffer.symbols() {
            let series = buffer.series(&symbol);
            let Some(latest) = series.last() else {
                continue;
            };
            let closes: Vec<f64> = series.iter().map(|q| q.price).collect();
            let set = IndicatorSet::compute(&closes, &self.params);

            let row = Row::new()
                .with("symbol", symbol.clone())
                .with("company_name", self.meta.name(&symbol))
                .with("sector", self.meta.sector(&symbol))
                .with("current_price", fmt_num(latest.price))
                .with(
                    "change_percent",
                    latest
                        .change_percent()
                        .map(fmt_num)
                        .unwrap_or_default(),
                )
                .with("volume", fmt_opt_u64(latest.volume))
                .with(
                    "market_cap_category",
                    latest
                        .market_cap
                        .map(categorize_market_cap)
                        .unwrap_or("Unknown"),
                )
                .with("price_category", categorize_price(latest.price))
                .with(
                    "change_category",
                    latest
                        .change_percent()
                        .map(categorize_change)
                        .unwrap_or("Unknown"),
                )
                .with("rsi", fmt_result(&set.rsi))
                .with("trend", self.trend_label(latest.price, &set))
                .with("last_updated", latest.timestamp.to_rfc3339());
            rows.push(row);
        }
        rows
    }

    // ── Performance ─────────────────────────────────────────────────────

    fn performance_rows(&self, buffer: &QuoteBuffer) -> Vec<Row> {
        // Lookbacks in buffer entries, mirroring daily-bar equivalents.
        const LOOKBACKS: [(&str, usize); 5] = [
            ("performance_1d", 2),
            ("performance_1w", 7),
            ("performance_1m", 30),
            ("performance_3m", 90),
            ("performance_6m", 180),
        ];

        let mut rows = Vec::new();
        for symbol in buffer.symbols() {
            let series = buffer.series(&symbol);
            let Some(latest) = series.last() else {
                continue;
            };
            let closes: Vec<f64> = series.iter().map(|q| q.price).collect();

            let mut row = Row::new()
                .with("symbol", symbol.clone())
                .with("current_price", fmt_num(latest.price));

            for (column, entries) in LOOKBACKS {
                let value = if closes.len() >= entries {
                    period_return(&closes[closes.len() - entries..])
                        .map(|r| fmt_num(r * 100.0))
                        .unwrap_or_default()
                } else {
                    String::new()
                };
                row.push(column, value);
            }
            row.push(
                "performance_full",
                period_return(&closes)
                    .map(|r| fmt_num(r * 100.0))
                    .unwrap_or_default(),
            );

            let returns = pct_returns(&closes);
            let volatility = if returns.len() >= 2 {
                fmt_num(sample_std_dev(&returns) * 100.0)
            } else {
                String::new()
            };
            row.push("volatility_pct", volatility);

            let max_price = series
                .iter()
                .filter_map(|q| q.high)
                .fold(f64::NEG_INFINITY, f64::max);
            let min_price = series
                .iter()
                .filter_map(|q| q.low)
                .fold(f64::INFINITY, f64::min);
            row.push(
                "max_price",
                max_price.is_finite().then(|| fmt_num(max_price)).unwrap_or_default(),
            );
            row.push(
                "min_price",
                min_price.is_finite().then(|| fmt_num(min_price)).unwrap_or_default(),
            );
            row.push(
                "avg_volume",
                average_volume(&series)
                    .map(|v| format!("{v:.0}"))
                    .unwrap_or_default(),
            );
            row.push("samples", series.len().to_string());
            rows.push(row);
        }
        rows
    }
}

// =============================================================================
// Quote columns
// =============================================================================

/// The fourteen documented per-quote CSV columns, in order.
fn push_quote_columns(row: &mut Row, quote: &Quote) {
    row.push("timestamp", quote.timestamp.to_rfc3339());
    row.push("symbol", quote.symbol.clone());
    row.push("price", fmt_num(quote.price));
    row.push("change", quote.change().map(fmt_num).unwrap_or_default());
    row.push(
        "change_percent",
        quote.change_percent().map(fmt_num).unwrap_or_default(),
    );
    row.push("volume", fmt_opt_u64(quote.volume));
    row.push(
        "market_cap",
        quote
            .market_cap
            .map(|v| format!("{v:.0}"))
            .unwrap_or_default(),
    );
    row.push("previous_close", fmt_opt(quote.previous_close));
    row.push("open", fmt_opt(quote.open));
    row.push("high", fmt_opt(quote.high));
    row.push("low", fmt_opt(quote.low));
    row.push("day_range", quote.day_range().unwrap_or_default());
    row.push("fifty_two_week_high", fmt_opt(quote.fifty_two_week_high));
    row.push("fifty_two_week_low", fmt_opt(quote.fifty_two_week_low));
}

fn fmt_num(v: f64) -> String {
    format!("{v:.2}")
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(fmt_num).unwrap_or_default()
}

fn fmt_opt_u64(v: Option<u64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

fn fmt_result(r: &Result<f64, IndicatorError>) -> String {
    r.as_ref().map(|&v| fmt_num(v)).unwrap_or_default()
}

/// Mean of the volumes present in the retained series.
fn average_volume(series: &[Quote]) -> Option<f64> {
    let volumes: Vec<f64> = series
        .iter()
        .filter_map(|q| q.volume.map(|v| v as f64))
        .collect();
    if volumes.is_empty() {
        None
    } else {
        Some(volumes.iter().sum::<f64>() / volumes.len() as f64)
    }
}

/// Intraday range as a percentage of the current price.
fn intraday_volatility(quote: &Quote) -> Option<f64> {
    match (quote.high, quote.low) {
        (Some(hi), Some(lo)) if quote.price != 0.0 => Some((hi - lo) / quote.price * 100.0),
        _ => None,
    }
}

// =============================================================================
// Categorization buckets
// =============================================================================

pub fn categorize_price(price: f64) -> &'static str {
    if price < 10.0 {
        "Under $10"
    } else if price < 25.0 {
        "$10-$25"
    } else if price < 50.0 {
        "$25-$50"
    } else if price < 100.0 {
        "$50-$100"
    } else if price < 200.0 {
        "$100-$200"
    } else {
        "Over $200"
    }
}

pub fn categorize_change(change_percent: f64) -> &'static str {
    if change_percent < -5.0 {
        "Large Decrease (>-5%)"
    } else if change_percent < -2.0 {
        "Decrease (-2% to -5%)"
    } else if change_percent < -0.5 {
        "Small Decrease (-0.5% to -2%)"
    } else if change_percent < 0.5 {
        "Stable (-0.5% to 0.5%)"
    } else if change_percent < 2.0 {
        "Small Increase (0.5% to 2%)"
    } else if change_percent < 5.0 {
        "Increase (2% to 5%)"
    } else {
        "Large Increase (>5%)"
    }
}

pub fn categorize_volume(volume: u64, average_volume: f64) -> &'static str {
    if average_volume <= 0.0 {
        return "Unknown";
    }
    let ratio = volume as f64 / average_volume;
    if ratio < 0.5 {
        "Very Low (<50%)"
    } else if ratio < 0.8 {
        "Low (50%-80%)"
    } else if ratio < 1.2 {
        "Normal (80%-120%)"
    } else if ratio < 2.0 {
        "High (120%-200%)"
    } else {
        "Very High (>200%)"
    }
}

pub fn categorize_market_cap(market_cap: f64) -> &'static str {
    if market_cap <= 0.0 {
        "Unknown"
    } else if market_cap < 300e6 {
        "Micro Cap (<$300M)"
    } else if market_cap < 2e9 {
        "Small Cap ($300M-$2B)"
    } else if market_cap < 10e9 {
        "Mid Cap ($2B-$10B)"
    } else if market_cap < 200e9 {
        "Large Cap ($10B-$200B)"
    } else {
        "Mega Cap (>$200B)"
    }
}

pub fn categorize_sector(sector: &str) -> &'static str {
    if sector.is_empty() || sector == "Unknown" {
        return "Unknown";
    }
    const TECH: [&str; 4] = ["Technology", "Software", "Hardware", "Semiconductors"];
    const FINANCE: [&str; 3] = ["Financial Services", "Banks", "Insurance"];
    const HEALTH: [&str; 3] = ["Healthcare", "Biotechnology", "Pharmaceuticals"];
    const CONSUMER: [&str; 3] = ["Consumer Discretionary", "Consumer Staples", "Retail"];

    // Health first: "Biotechnology" contains "Technology" and must not land
    // in the tech bucket.
    if HEALTH.iter().any(|t| sector.contains(t)) {
        "Healthcare"
    } else if TECH.iter().any(|t| sector.contains(t)) {
        "Technology"
    } else if FINANCE.iter().any(|t| sector.contains(t)) {
        "Financial"
    } else if CONSUMER.iter().any(|t| sector.contains(t)) {
        "Consumer"
    } else {
        "Other"
    }
}

pub fn categorize_volatility(volatility_percent: f64) -> &'static str {
    if volatility_percent < 1.0 {
        "Very Low (<1%)"
    } else if volatility_percent < 2.0 {
        "Low (1%-2%)"
    } else if volatility_percent < 3.0 {
        "Medium (2%-3%)"
    } else if volatility_percent < 5.0 {
        "High (3%-5%)"
    } else {
        "Very High (>5%)"
    }
}
