use serde::{Deserialize, Serialize};

use crate::error::ParseError;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV candle from the Binance klines endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time in milliseconds since the UNIX epoch; the ordering key.
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// One fetch window of candles: non-empty, strictly ascending by open time.
///
/// A series is replaced wholesale on every successful fetch; it never grows in
/// place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Validate a freshly parsed response against the request `limit`.
    pub fn from_response(candles: Vec<Candle>, limit: u32) -> Result<Self, ParseError> {
        if candles.is_empty() {
            return Err(ParseError::new("klines response contained no candles"));
        }
        if candles.len() > limit as usize {
            return Err(ParseError::new(format!(
                "klines response has {} candles, more than the requested limit {limit}",
                candles.len()
            )));
        }
        if let Some(w) = candles.windows(2).find(|w| w[1].open_time <= w[0].open_time) {
            return Err(ParseError::new(format!(
                "open times not strictly increasing: {} followed by {}",
                w[0].open_time, w[1].open_time
            )));
        }
        Ok(Self { candles })
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Close prices in series order, as fed to the indicators.
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}

// ---------------------------------------------------------------------------
// Kline row parsing
// ---------------------------------------------------------------------------

/// Minimum number of positional fields in a kline row.
///
///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
///   [6] closeTime, [7] quoteAssetVolume, [8] numberOfTrades,
///   [9] takerBuyBaseVolume, [10] takerBuyQuoteVolume, [11] ignore
///
/// Only the first six are kept.
const KLINE_FIELDS: usize = 12;

/// Decode a full `GET /api/v3/klines` body (a JSON array of arrays).
pub fn parse_klines(body: &[u8]) -> Result<Vec<Candle>, ParseError> {
    let root: serde_json::Value = serde_json::from_slice(body)?;
    let rows = root
        .as_array()
        .ok_or_else(|| ParseError::new("klines response is not an array"))?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| parse_kline_row(row).map_err(|e| ParseError::new(format!("row {i}: {e}"))))
        .collect()
}

/// Turn one positional kline row into a [`Candle`].
pub fn parse_kline_row(row: &serde_json::Value) -> Result<Candle, ParseError> {
    let arr = row
        .as_array()
        .ok_or_else(|| ParseError::new("kline entry is not an array"))?;

    if arr.len() < KLINE_FIELDS {
        return Err(ParseError::new(format!(
            "kline entry has {} fields, expected {KLINE_FIELDS}",
            arr.len()
        )));
    }

    let candle = Candle {
        open_time: parse_millis(&arr[0], "openTime")?,
        open: parse_string_f64(&arr[1], "open")?,
        high: parse_string_f64(&arr[2], "high")?,
        low: parse_string_f64(&arr[3], "low")?,
        close: parse_string_f64(&arr[4], "close")?,
        volume: parse_string_f64(&arr[5], "volume")?,
    };

    if candle.high < candle.open.max(candle.close).max(candle.low)
        || candle.low > candle.open.min(candle.close).min(candle.high)
    {
        return Err(ParseError::new(format!(
            "inconsistent range at {}: high={} low={} open={} close={}",
            candle.open_time, candle.high, candle.low, candle.open, candle.close
        )));
    }

    Ok(candle)
}

/// Binance sends prices and volumes as JSON strings; plain numbers are
/// accepted too.
fn parse_string_f64(val: &serde_json::Value, name: &str) -> Result<f64, ParseError> {
    let parsed = match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| ParseError::new(format!("failed to parse {name} as f64: {s:?}")))?,
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ParseError::new(format!("field {name} is not a valid f64")))?,
        other => return Err(ParseError::new(format!("field {name} has unexpected JSON type: {other}"))),
    };

    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(ParseError::new(format!("field {name} is not finite")))
    }
}

fn parse_millis(val: &serde_json::Value, name: &str) -> Result<i64, ParseError> {
    match val {
        serde_json::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| ParseError::new(format!("field {name} is not an integer: {n}"))),
        serde_json::Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| ParseError::new(format!("failed to parse {name} as integer: {s:?}"))),
        other => Err(ParseError::new(format!("field {name} has unexpected JSON type: {other}"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_row(open_time: i64, o: &str, h: &str, l: &str, c: &str) -> serde_json::Value {
        json!([
            open_time, o, h, l, c, "12.5",
            open_time + 59_999, "460000.1", 321, "6.1", "225000.0", "0"
        ])
    }

    fn candle(open_time: i64, close: f64) -> Candle {
        Candle {
            open_time,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn parses_well_formed_row() {
        let row = sample_row(1_700_000_000_000, "37000.00", "37050.00", "36990.00", "37020.00");
        let c = parse_kline_row(&row).expect("should parse");
        assert_eq!(c.open_time, 1_700_000_000_000);
        assert!((c.close - 37020.0).abs() < f64::EPSILON);
        assert!((c.volume - 12.5).abs() < f64::EPSILON);
        assert!(c.high >= c.open.max(c.close).max(c.low));
        assert!(c.low <= c.open.min(c.close).min(c.high));
    }

    #[test]
    fn accepts_numeric_fields() {
        let row = json!([60_000, 1.5, 2.0, 1.0, 1.25, 3, 119_999, 0, 0, 0, 0, 0]);
        let c = parse_kline_row(&row).unwrap();
        assert_eq!(c.open_time, 60_000);
        assert!((c.close - 1.25).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_non_numeric_price() {
        let row = sample_row(0, "abc", "2", "1", "1.5");
        let err = parse_kline_row(&row).unwrap_err();
        assert!(err.0.contains("open"), "{err}");
    }

    #[test]
    fn rejects_short_row() {
        let row = json!([0, "1", "2", "0.5", "1.5", "10"]);
        assert!(parse_kline_row(&row).is_err());
    }

    #[test]
    fn rejects_high_below_close() {
        let row = sample_row(0, "1.0", "1.2", "0.9", "1.5");
        assert!(parse_kline_row(&row).is_err());
    }

    #[test]
    fn parse_klines_rejects_malformed_and_non_array() {
        assert!(parse_klines(b"").is_err());
        assert!(parse_klines(b"{\"code\":-1121}").is_err());
        assert!(parse_klines(b"[[1,2,").is_err());
    }

    #[test]
    fn parse_klines_reports_bad_row_index() {
        let body = json!([
            sample_row(0, "1", "2", "0.5", "1.5"),
            sample_row(60_000, "1", "2", "0.5", "x"),
        ]);
        let err = parse_klines(body.to_string().as_bytes()).unwrap_err();
        assert!(err.0.starts_with("row 1"), "{err}");
    }

    #[test]
    fn series_requires_strictly_increasing_open_times() {
        let dup = vec![candle(0, 1.0), candle(0, 2.0)];
        assert!(CandleSeries::from_response(dup, 10).is_err());

        let backwards = vec![candle(60_000, 1.0), candle(0, 2.0)];
        assert!(CandleSeries::from_response(backwards, 10).is_err());

        let ok = CandleSeries::from_response(vec![candle(0, 1.0), candle(60_000, 2.0)], 10).unwrap();
        assert_eq!(ok.closes(), vec![1.0, 2.0]);
        assert_eq!(ok.last().map(|c| c.open_time), Some(60_000));
    }

    #[test]
    fn series_rejects_empty_and_oversized_responses() {
        assert!(CandleSeries::from_response(Vec::new(), 10).is_err());
        let three = vec![candle(0, 1.0), candle(1, 1.0), candle(2, 1.0)];
        assert!(CandleSeries::from_response(three, 2).is_err());
    }
}
