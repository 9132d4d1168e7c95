// =============================================================================
// MACD — Moving Average Convergence / Divergence
// =============================================================================
//
//   line      = EMA(fast) - EMA(slow)
//   signal    = EMA(line, signal_period), seeded by the SMA of the first
//               `signal_period` defined line values
//   histogram = line - signal
//
// Warm-up: `line` is undefined before index `slow - 1`; `signal` and
// `histogram` are undefined before index `slow + signal - 2`.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::ema::{calculate_ema, ema_aligned};
use super::ensure_enough_closes;
use crate::error::IndicatorError;

/// Periods for the MACD computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// The three MACD sequences, each aligned to the input closes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdSeries {
    pub line: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

pub fn calculate_macd(closes: &[f64], params: MacdParams) -> Result<MacdSeries, IndicatorError> {
    ensure_enough_closes(closes)?;

    let fast = ema_aligned(closes, params.fast);
    let slow = ema_aligned(closes, params.slow);

    let line: Vec<Option<f64>> = fast
        .iter()
        .zip(&slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    // The defined part of the line is contiguous from its first defined index
    // up to any non-finite break.
    let mut signal = vec![None; closes.len()];
    if let Some(start) = line.iter().position(Option::is_some) {
        let defined: Vec<f64> = line[start..].iter().map_while(|v| *v).collect();
        if params.signal > 0 {
            for (i, v) in calculate_ema(&defined, params.signal).into_iter().enumerate() {
                signal[start + params.signal - 1 + i] = Some(v);
            }
        }
    }

    let histogram = line
        .iter()
        .zip(&signal)
        .map(|(l, s)| Some((*l)? - (*s)?))
        .collect();

    Ok(MacdSeries {
        line,
        signal,
        histogram,
    })
}
