// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Rolling middle band (SMA over `period` closes) with an upper band
// (SMA + k*σ) and a lower band (SMA - k*σ). σ is the population standard
// deviation over the same window.

use serde::Serialize;

use super::ensure_enough_closes;
use crate::error::IndicatorError;

/// Rolling bands aligned to the input closes; undefined before `period - 1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BollingerBands {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

pub fn calculate_bollinger(
    closes: &[f64],
    period: usize,
    num_std: f64,
) -> Result<BollingerBands, IndicatorError> {
    ensure_enough_closes(closes)?;

    let n = closes.len();
    let mut bands = BollingerBands {
        upper: vec![None; n],
        middle: vec![None; n],
        lower: vec![None; n],
    };
    if period == 0 || n < period {
        return Ok(bands);
    }

    for (i, window) in closes.windows(period).enumerate() {
        let idx = i + period - 1;
        let middle = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period as f64;
        let std_dev = variance.sqrt();

        if !std_dev.is_finite() || !middle.is_finite() {
            continue;
        }

        bands.middle[idx] = Some(middle);
        bands.upper[idx] = Some(middle + num_std * std_dev);
        bands.lower[idx] = Some(middle - num_std * std_dev);
    }

    Ok(bands)
}
