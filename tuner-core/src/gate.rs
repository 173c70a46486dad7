//! # Frame Gate
//!
//! Cheap checks that reject frames unlikely to hold a single, tonal,
//! sufficiently loud note before the pitch search runs.
//!
//! A frame passes when its mean absolute magnitude reaches the intensity
//! threshold and its zero-crossing count stays under a ceiling that scales
//! with the frame length and sample rate.

use crate::config::PipelineConfig;

/// Result of gating one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    /// The frame is worth analyzing.
    Pass { intensity: f64 },
    /// Mean magnitude under the threshold (silence or a faint signal).
    TooQuiet { intensity: f64 },
    /// Too many sign changes for a clean tone.
    TooNoisy {
        intensity: f64,
        crossings: usize,
        max_crossings: f64,
    },
}

impl GateDecision {
    /// Whether the frame may go on to pitch estimation.
    ///
    /// # Returns
    /// * `true` - Loud enough and below the crossing ceiling
    /// * `false` - Rejected as quiet or noisy
    pub fn passed(&self) -> bool {
        matches!(self, GateDecision::Pass { .. })
    }
}

/// Mean of `|sample|` over the frame. An empty frame has zero intensity.
pub fn average_intensity(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64).abs()).sum();
    sum / samples.len() as f64
}

/// Counts sign changes between adjacent samples. Zero counts as positive.
pub fn zero_crossing_count(samples: &[i16]) -> usize {
    samples
        .windows(2)
        .filter(|pair| (pair[0] >= 0) != (pair[1] >= 0))
        .count()
}

/// The crossing ceiling for a frame of `read` samples at `sample_rate`.
///
/// The base ceiling applies at the reference configuration and is scaled
/// linearly in both frame length and sample rate.
pub fn max_crossings(read: usize, sample_rate: u32, config: &PipelineConfig) -> f64 {
    config.base_zero_crossings
        * (read as f64 / config.reference_frame_length as f64)
        * (sample_rate as f64 / config.reference_sample_rate as f64)
}

/// Decides whether `samples` (the `read` samples of one frame) go on to
/// pitch estimation.
pub fn evaluate(samples: &[i16], sample_rate: u32, config: &PipelineConfig) -> GateDecision {
    let intensity = average_intensity(samples);
    if intensity < config.min_intensity {
        return GateDecision::TooQuiet { intensity };
    }

    let crossings = zero_crossing_count(samples);
    let max_crossings = max_crossings(samples.len(), sample_rate, config);
    if crossings as f64 > max_crossings {
        return GateDecision::TooNoisy {
            intensity,
            crossings,
            max_crossings,
        };
    }

    GateDecision::Pass { intensity }
}
