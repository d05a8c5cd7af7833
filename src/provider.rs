// =============================================================================
// Yahoo Finance chart client
// =============================================================================
//
// Single-endpoint adapter behind the `QuoteSource` trait: one GET against
// /v8/finance/chart/{symbol} per fetch, normalized into a `Quote`. Every
// failure is classified so the scheduler can decide what to retry:
//   - NotFound           unknown symbol (404, or a well-formed empty result)
//   - Transient          transport errors, timeouts, 5xx / 429 and other
//                        non-success statuses
//   - MalformedResponse  body that parses but cannot become a usable quote
//
// The client never retries internally; the retry policy lives in the
// scheduler where attempts can be counted and reported per cycle.
// =============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::FetchError;
use crate::quote::{Quote, QuoteSource};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) quotepulse/1.0";
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// HTTP quote source backed by the Yahoo chart endpoint.
#[derive(Clone)]
pub struct YahooQuoteClient {
    base_url: String,
    client: reqwest::Client,
}

impl YahooQuoteClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the client at a different host, e.g. a local stub in tests or a
    /// caching proxy in front of the real endpoint.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}?range=1d&interval=1d",
            self.base_url, symbol
        )
    }
}

impl Default for YahooQuoteClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteSource for YahooQuoteClient {
    #[instrument(skip(self), name = "yahoo::fetch_quote")]
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, FetchError> {
        let url = self.chart_url(symbol);
        debug!(url = %url, "requesting chart");

        let response = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| FetchError::Transient {
                message: format!("transport failure: {e}"),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                symbol: symbol.to_string(),
            });
        }
        if !status.is_success() {
            // 5xx and 429 included; the provider also answers auth hiccups
            // with non-success statuses that clear on their own.
            return Err(FetchError::Transient {
                message: format!("provider returned status {status}"),
            });
        }

        let payload: ChartResponse = response.json().await.map_err(|e| {
            if e.is_decode() {
                FetchError::MalformedResponse {
                    message: format!("undecodable chart payload: {e}"),
                }
            } else {
                FetchError::Transient {
                    message: format!("failed reading chart payload: {e}"),
                }
            }
        })?;

        quote_from_chart(symbol, payload)
    }
}

// =============================================================================
// Response shape
// =============================================================================
//
// The chart endpoint nests everything under `chart`, with `result` null when
// the provider reports an error instead. With range=1d&interval=1d the result
// carries a single daily bar in `indicators.quote[0]` plus a `meta` block
// with the live figures.

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    #[serde(default)]
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice", default)]
    regular_market_price: Option<f64>,
    #[serde(rename = "regularMarketTime", default)]
    regular_market_time: Option<i64>,
    #[serde(rename = "chartPreviousClose", default)]
    chart_previous_close: Option<f64>,
    #[serde(rename = "previousClose", default)]
    previous_close: Option<f64>,
    #[serde(rename = "regularMarketDayHigh", default)]
    regular_market_day_high: Option<f64>,
    #[serde(rename = "regularMarketDayLow", default)]
    regular_market_day_low: Option<f64>,
    #[serde(rename = "regularMarketVolume", default)]
    regular_market_volume: Option<u64>,
    #[serde(rename = "fiftyTwoWeekHigh", default)]
    fifty_two_week_high: Option<f64>,
    #[serde(rename = "fiftyTwoWeekLow", default)]
    fifty_two_week_low: Option<f64>,
    #[serde(rename = "marketCap", default)]
    market_cap: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartBarArrays>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartBarArrays {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

// =============================================================================
// Normalization
// =============================================================================

/// Map a decoded chart response into a `Quote`, validating price and
/// timestamp. Meta figures win over the daily bar; the bar fills gaps.
fn quote_from_chart(symbol: &str, response: ChartResponse) -> Result<Quote, FetchError> {
    let results = response.chart.result.unwrap_or_default();
    let Some(result) = results.into_iter().next() else {
        return Err(FetchError::NotFound {
            symbol: symbol.to_string(),
        });
    };

    let meta = result.meta;
    let bar = result.indicators.quote.into_iter().next();

    let price = meta
        .regular_market_price
        .or_else(|| last_value(bar.as_ref().map(|b| b.close.as_slice())));
    let Some(price) = price else {
        return Err(FetchError::MalformedResponse {
            message: "price missing from chart response".to_string(),
        });
    };
    if price <= 0.0 {
        return Err(FetchError::MalformedResponse {
            message: format!("non-positive price {price}"),
        });
    }

    let epoch = meta
        .regular_market_time
        .or_else(|| result.timestamp.as_deref().and_then(|ts| ts.last().copied()));
    let timestamp = epoch.and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
    let Some(timestamp) = timestamp else {
        return Err(FetchError::MalformedResponse {
            message: "timestamp missing from chart response".to_string(),
        });
    };

    let high = meta
        .regular_market_day_high
        .or_else(|| extreme(bar.as_ref().map(|b| b.high.as_slice()), f64::max));
    let low = meta
        .regular_market_day_low
        .or_else(|| extreme(bar.as_ref().map(|b| b.low.as_slice()), f64::min));
    let open = bar
        .as_ref()
        .and_then(|b| b.open.iter().find_map(|v| *v));
    let volume = meta
        .regular_market_volume
        .or_else(|| bar.as_ref().and_then(|b| b.volume.iter().rev().find_map(|v| *v)));

    Ok(Quote {
        symbol: symbol.to_string(),
        timestamp,
        price,
        previous_close: meta.chart_previous_close.or(meta.previous_close),
        open,
        high,
        low,
        volume,
        market_cap: meta.market_cap,
        fifty_two_week_high: meta.fifty_two_week_high,
        fifty_two_week_low: meta.fifty_two_week_low,
    })
}

fn last_value(values: Option<&[Option<f64>]>) -> Option<f64> {
    values.and_then(|vs| vs.iter().rev().find_map(|v| *v))
}

fn extreme(values: Option<&[Option<f64>]>, pick: fn(f64, f64) -> f64) -> Option<f64> {
    values.and_then(|vs| vs.iter().filter_map(|v| *v).reduce(pick))
}
