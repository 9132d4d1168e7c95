// =============================================================================
// RSI — Wilder-smoothed relative strength
// =============================================================================
//
// The first `period` close-to-close changes are averaged plainly into a gain
// mean and a loss mean. Each later change folds in with weight 1/period:
//
//   avg = (avg * (period - 1) + change) / period
//
// RSI = 100 - 100 / (1 + avg_gain / avg_loss), drawn against guide lines at
// 70 and 30.
// =============================================================================

use super::ensure_enough_closes;
use crate::error::IndicatorError;

pub const OVERBOUGHT: f64 = 70.0;
pub const OVERSOLD: f64 = 30.0;

/// Running Wilder averages of upward and downward moves.
#[derive(Debug, Clone, Copy)]
struct WilderAverages {
    gain: f64,
    loss: f64,
    period: f64,
}

impl WilderAverages {
    fn seed(changes: &[f64]) -> Self {
        let period = changes.len() as f64;
        let gain = changes.iter().map(|c| c.max(0.0)).sum::<f64>() / period;
        let loss = changes.iter().map(|c| (-c).max(0.0)).sum::<f64>() / period;
        Self { gain, loss, period }
    }

    fn update(&mut self, change: f64) {
        let keep = self.period - 1.0;
        self.gain = (self.gain * keep + change.max(0.0)) / self.period;
        self.loss = (self.loss * keep + (-change).max(0.0)) / self.period;
    }

    /// 50 when nothing moved, 100 when nothing fell.
    fn rsi(&self) -> Option<f64> {
        let value = match (self.gain, self.loss) {
            (g, l) if g == 0.0 && l == 0.0 => 50.0,
            (_, l) if l == 0.0 => 100.0,
            (g, l) => 100.0 - 100.0 / (1.0 + g / l),
        };
        value.is_finite().then_some(value)
    }
}

/// RSI aligned to `closes`; the first defined value sits at index `period`.
///
/// Too little history (or `period == 0`) yields an all-`None` series. A
/// non-finite reading ends the defined run.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    ensure_enough_closes(closes)?;

    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return Ok(out);
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let mut averages = WilderAverages::seed(&changes[..period]);

    // changes[k] moves close k to close k + 1.
    for (k, slot) in out.iter_mut().enumerate().skip(period) {
        if k > period {
            averages.update(changes[k - 1]);
        }
        match averages.rsi() {
            Some(v) => *slot = Some(v),
            None => break,
        }
    }

    Ok(out)
}

/// Label for an RSI reading relative to the guide lines.
pub fn rsi_zone(value: f64) -> &'static str {
    match value {
        v if v >= OVERBOUGHT => "OVERBOUGHT",
        v if v <= OVERSOLD => "OVERSOLD",
        _ => "NEUTRAL",
    }
}
