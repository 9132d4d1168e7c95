// =============================================================================
// Binance REST API Client — public klines endpoint
// =============================================================================
//
// One bounded GET per call, no signing. Failures are classified as network,
// HTTP status, or parse errors; a 2xx body that does not form a non-empty,
// strictly ordered candle series is a parse error too.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::binance::rate_limit::RateLimitTracker;
use crate::error::FetchError;
use crate::market_data::{parse_klines, CandleSeries, KlineSource};

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Error bodies are truncated to this many characters before being stored.
const MAX_ERROR_BODY: usize = 256;

/// Binance REST API client for public market data.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
    rate_limit: Arc<RateLimitTracker>,
}

impl BinanceClient {
    /// Create a new `BinanceClient`.
    ///
    /// # Arguments
    /// * `base_url`: scheme + host, e.g. `https://api.binance.com`.
    /// * `timeout`: applied to every request, connect through body.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        debug!(base_url = %base_url, timeout_ms = timeout.as_millis() as u64, "BinanceClient initialised");

        Ok(Self {
            base_url,
            client,
            rate_limit: Arc::new(RateLimitTracker::new()),
        })
    }

    /// Shared request-weight tracker fed from response headers.
    pub fn rate_limit(&self) -> Arc<RateLimitTracker> {
        Arc::clone(&self.rate_limit)
    }

    /// GET /api/v3/klines (public, unsigned).
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
        start_time_ms: Option<i64>,
    ) -> Result<CandleSeries, FetchError> {
        let url = format!("{}/api/v3/klines", self.base_url);

        let mut query: Vec<(&str, String)> = vec![
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(start) = start_time_ms {
            query.push(("startTime", start.to_string()));
        }

        let resp = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(classify_transport)?;

        self.rate_limit.update_from_headers(resp.headers());

        let status = resp.status();
        let body = resp.bytes().await.map_err(classify_transport)?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            warn!(symbol, status = status.as_u16(), "klines request rejected");
            return Err(FetchError::Http {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let candles = parse_klines(&body)?;
        let series = CandleSeries::from_response(candles, limit)?;

        if let (Some(first), Some(last)) = (series.candles().first(), series.last()) {
            debug!(
                symbol,
                interval,
                count = series.len(),
                first_open_time = first.open_time,
                last_open_time = last.open_time,
                last_close = last.close,
                "klines fetched"
            );
        }
        Ok(series)
    }
}

impl KlineSource for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
        start_time_ms: Option<i64>,
    ) -> Result<CandleSeries, FetchError> {
        self.get_klines(symbol, interval, limit, start_time_ms).await
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

/// Timeouts, refused connections and broken body streams are network errors;
/// anything reqwest reports as a decode failure is a parse error.
fn classify_transport(err: reqwest::Error) -> FetchError {
    if err.is_decode() {
        FetchError::Parse(crate::error::ParseError::new(err.to_string()))
    } else {
        FetchError::Network(err.to_string())
    }
}
