//! # Pitch Estimation Module
//!
//! Time-domain fundamental frequency estimation for plucked strings.
//!
//! ## Features
//! - Sum-of-absolute-differences (ASDF) search over a lag band derived from
//!   the frequency band
//! - Circular indexing so lagged samples always come from captured data
//! - Quadratic interpolation around the best lag for sub-sample accuracy

/// Converts a frequency band to the matching (inclusive) lag band in samples.
///
/// The highest frequency maps to the shortest lag. The lower bound is kept at
/// two samples so the interpolation neighbour below it is never lag zero.
pub fn lag_range(sample_rate: u32, min_freq: f32, max_freq: f32) -> (usize, usize) {
    let rate = sample_rate as f32;
    let min_lag = (rate / max_freq).round().max(2.0) as usize;
    let max_lag = (rate / min_freq).round() as usize;
    (min_lag, max_lag)
}

/// Sum of `|x[i - lag] - x[i]|` over the first `window` samples, with
/// negative indices wrapping to the end of the frame.
pub fn difference_sum(samples: &[i16], window: usize, lag: usize) -> i64 {
    let frames = samples.len() as isize;
    let lag = lag as isize;
    samples
        .iter()
        .take(window)
        .enumerate()
        .map(|(i, &current)| {
            let old_index = (i as isize - lag).rem_euclid(frames) as usize;
            (samples[old_index] as i64 - current as i64).abs()
        })
        .sum()
}

/// Sub-sample offset of the minimum of the parabola through three
/// equally spaced difference values.
///
/// # Arguments
/// * `prev`, `best`, `next` - Difference sums at lags `L - 1`, `L`, `L + 1`
///
/// # Returns
/// * An offset in `[-0.5, 0.5]` when `best` is a local minimum
/// * `0.0` when a neighbour lies below `best`, the three points are
///   collinear, or the result is not finite
pub fn interpolation_offset(prev: i64, best: i64, next: i64) -> f32 {
    if prev < best || next < best {
        return 0.0;
    }
    // Negative for a parabola opening upward.
    let denominator = 2 * (2 * best - next - prev);
    if denominator >= 0 {
        return 0.0;
    }
    let delta = (next - prev) as f64 / denominator as f64;
    if delta.is_finite() { delta as f32 } else { 0.0 }
}

/// Estimates the fundamental frequency of `samples`.
///
/// # Arguments
/// * `samples` - One frame of audio; its length is the circular wrap length
/// * `window` - Number of leading samples compared at each lag
/// * `sample_rate` - Sample rate in Hz
/// * `min_freq`, `max_freq` - Search band in Hz
///
/// # Returns
/// * `Some(frequency)` - Finite, positive frequency in Hz
/// * `None` - Empty frame, empty window or an empty lag band
pub fn detect_pitch_asdf(
    samples: &[i16],
    window: usize,
    sample_rate: u32,
    min_freq: f32,
    max_freq: f32,
) -> Option<f32> {
    if samples.is_empty() || window == 0 || sample_rate == 0 {
        return None;
    }
    let window = window.min(samples.len());
    let (min_lag, max_lag) = lag_range(sample_rate, min_freq, max_freq);
    if max_lag < min_lag {
        return None;
    }

    // sums[k] holds the difference at lag (min_lag - 1 + k), so both
    // neighbours of any lag in the band are available.
    let first_lag = min_lag - 1;
    let sums: Vec<i64> = (first_lag..=max_lag + 1)
        .map(|lag| difference_sum(samples, window, lag))
        .collect();

    let mut best_lag = min_lag;
    let mut min_sum = i64::MAX;
    for lag in min_lag..=max_lag {
        let sum = sums[lag - first_lag];
        if sum < min_sum {
            min_sum = sum;
            best_lag = lag;
        }
    }

    let idx = best_lag - first_lag;
    let delta = interpolation_offset(sums[idx - 1], sums[idx], sums[idx + 1]);
    let period = best_lag as f32 + delta;
    let frequency = sample_rate as f32 / period;

    if frequency.is_finite() && frequency > 0.0 {
        Some(frequency)
    } else {
        Some(sample_rate as f32 / best_lag as f32)
    }
}
