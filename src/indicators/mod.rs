// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator functions over a closing-price sequence.
// Every output is aligned to its input: one slot per close, `None` during an
// indicator's warm-up. Fewer than two closes is an error, never a sequence of
// `None`s.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;

use serde::{Deserialize, Serialize};

use crate::error::IndicatorError;

pub use bollinger::calculate_bollinger;
pub use macd::{calculate_macd, MacdParams};
pub use rsi::{calculate_rsi, rsi_zone};

pub(crate) fn ensure_enough_closes(closes: &[f64]) -> Result<(), IndicatorError> {
    if closes.len() < 2 {
        Err(IndicatorError::InsufficientData { len: closes.len() })
    } else {
        Ok(())
    }
}

/// Parameters for the three indicators drawn on the chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub macd: MacdParams,
    pub rsi_period: usize,
    pub bb_period: usize,
    pub bb_k: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            macd: MacdParams::default(),
            rsi_period: 14,
            bb_period: 20,
            bb_k: 2.0,
        }
    }
}

/// MACD, RSI and Bollinger Bands over the same index domain as a candle series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSet {
    pub macd_line: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub macd_histogram: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub bb_upper: Vec<Option<f64>>,
    pub bb_middle: Vec<Option<f64>>,
    pub bb_lower: Vec<Option<f64>>,
}

impl IndicatorSet {
    pub fn compute(closes: &[f64], params: &IndicatorParams) -> Result<Self, IndicatorError> {
        let macd = calculate_macd(closes, params.macd)?;
        let rsi = calculate_rsi(closes, params.rsi_period)?;
        let bands = calculate_bollinger(closes, params.bb_period, params.bb_k)?;

        Ok(Self {
            macd_line: macd.line,
            macd_signal: macd.signal,
            macd_histogram: macd.histogram,
            rsi,
            bb_upper: bands.upper,
            bb_middle: bands.middle,
            bb_lower: bands.lower,
        })
    }

    pub fn len(&self) -> usize {
        self.rsi.len()
    }

    /// Most recent value of every sequence (`None` while still warming up).
    pub fn latest(&self) -> LatestIndicators {
        let last = |v: &[Option<f64>]| v.last().copied().flatten();
        let rsi = last(&self.rsi);
        LatestIndicators {
            macd_line: last(&self.macd_line),
            macd_signal: last(&self.macd_signal),
            macd_histogram: last(&self.macd_histogram),
            rsi,
            rsi_zone: rsi.map(rsi_zone),
            bb_upper: last(&self.bb_upper),
            bb_lower: last(&self.bb_lower),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestIndicators {
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub rsi: Option<f64>,
    pub rsi_zone: Option<&'static str>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
}
