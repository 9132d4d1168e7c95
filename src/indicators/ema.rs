// =============================================================================
// EMA — exponential moving average, SMA-seeded
// =============================================================================
//
// alpha = 2 / (period + 1); the first value is the plain mean of the first
// `period` inputs, then ema = alpha * x + (1 - alpha) * ema.
// =============================================================================

/// Compact EMA: element 0 corresponds to input index `period - 1`.
///
/// Empty when `period` is 0 or longer than the input. The series is cut
/// short at the first non-finite value.
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    std::iter::once(seed)
        .chain(values[period..].iter().scan(seed, |ema, &x| {
            *ema = alpha * x + (1.0 - alpha) * *ema;
            Some(*ema)
        }))
        .take_while(|v| v.is_finite())
        .collect()
}

/// [`calculate_ema`] re-indexed onto the input, `None` where undefined.
pub fn ema_aligned(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    let offset = period.saturating_sub(1);
    for (slot, v) in out[offset.min(values.len())..]
        .iter_mut()
        .zip(calculate_ema(values, period))
    {
        *slot = Some(v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_inputs_give_nothing() {
        assert!(calculate_ema(&[], 3).is_empty());
        assert!(calculate_ema(&[1.0, 2.0], 0).is_empty());
        assert!(calculate_ema(&[1.0, 2.0], 3).is_empty());
    }

    #[test]
    fn seeds_with_mean_then_smooths() {
        // alpha = 0.5, seed = mean(2, 4, 6) = 4, then 0.5 * 8 + 0.5 * 4 = 6
        assert_eq!(calculate_ema(&[2.0, 4.0, 6.0, 8.0], 3), vec![4.0, 6.0]);
    }

    #[test]
    fn period_one_tracks_input() {
        assert_eq!(calculate_ema(&[3.0, 1.0, 4.0], 1), vec![3.0, 1.0, 4.0]);
    }

    #[test]
    fn non_finite_input_truncates() {
        assert_eq!(calculate_ema(&[1.0, 2.0, 3.0, f64::NAN, 5.0], 3), vec![2.0]);
        assert!(calculate_ema(&[f64::INFINITY, 1.0], 2).is_empty());
    }

    #[test]
    fn aligned_places_values_after_warm_up() {
        let ema = ema_aligned(&[2.0, 4.0, 6.0, 8.0, 10.0], 3);
        assert_eq!(ema, vec![None, None, Some(4.0), Some(6.0), Some(8.0)]);
    }

    #[test]
    fn aligned_handles_short_and_zero_period() {
        assert_eq!(ema_aligned(&[1.0, 2.0], 5), vec![None, None]);
        assert_eq!(ema_aligned(&[1.0, 2.0], 0), vec![None, None]);
    }
}
