pub mod candle;

use std::future::Future;

pub use candle::{parse_klines, Candle, CandleSeries};

use crate::error::FetchError;

/// Anything that can serve one bounded window of historical klines.
///
/// The production implementation is [`crate::binance::client::BinanceClient`];
/// the refresh loop only ever talks to this trait.
pub trait KlineSource: Send + Sync + 'static {
    fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
        start_time_ms: Option<i64>,
    ) -> impl Future<Output = Result<CandleSeries, FetchError>> + Send;
}
