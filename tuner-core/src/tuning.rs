//! # Guitar Tuning Module
//!
//! Named six-string tunings and the helpers a front end needs to turn a
//! detected frequency into "which string, how far off".
//!
//! The processing pipeline never calls into this module; it only publishes
//! frequencies.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Deviation (in cents) under which a string counts as in tune.
pub const IN_TUNE_CENTS: f32 = 5.0;

/// A target string pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pitch {
    /// Note name with octave (e.g. "E2").
    pub name: &'static str,
    /// Frequency in Hz.
    pub frequency: f32,
}

/// A named tuning, lowest string first.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuning {
    pub name: &'static str,
    pub pitches: [Pitch; 6],
}

fn pitch(name: &'static str, frequency: f32) -> Pitch {
    Pitch { name, frequency }
}

/// All known tunings, keyed by name.
static TUNINGS: Lazy<BTreeMap<&'static str, Tuning>> = Lazy::new(|| {
    let tunings = [
        Tuning {
            name: "standard",
            pitches: [
                pitch("E2", 82.41),
                pitch("A2", 110.00),
                pitch("D3", 146.83),
                pitch("G3", 196.00),
                pitch("B3", 246.94),
                pitch("E4", 329.63),
            ],
        },
        Tuning {
            name: "open-a",
            pitches: [
                pitch("E2", 82.41),
                pitch("A2", 110.00),
                pitch("E3", 164.81),
                pitch("A3", 220.00),
                pitch("C#4", 277.18),
                pitch("E4", 329.63),
            ],
        },
        Tuning {
            name: "open-g",
            pitches: [
                pitch("D2", 73.42),
                pitch("G2", 98.00),
                pitch("D3", 146.83),
                pitch("G3", 196.00),
                pitch("B3", 246.94),
                pitch("D4", 293.66),
            ],
        },
        Tuning {
            name: "open-d",
            pitches: [
                pitch("D2", 73.42),
                pitch("A2", 110.00),
                pitch("D3", 146.83),
                pitch("F#3", 185.00),
                pitch("A3", 220.00),
                pitch("D4", 293.66),
            ],
        },
        Tuning {
            name: "drop-d",
            pitches: [
                pitch("D2", 73.42),
                pitch("A2", 110.00),
                pitch("D3", 146.83),
                pitch("G3", 196.00),
                pitch("B3", 246.94),
                pitch("E4", 329.63),
            ],
        },
    ];
    tunings.into_iter().map(|t| (t.name, t)).collect()
});

/// Looks up a tuning by name (e.g. "standard", "drop-d").
pub fn tuning_by_name(name: &str) -> Option<&'static Tuning> {
    TUNINGS.get(name)
}

/// Names of every known tuning, sorted.
pub fn tuning_names() -> Vec<&'static str> {
    TUNINGS.keys().copied().collect()
}

impl Tuning {
    /// Index of the string whose target frequency is closest to `freq`.
    pub fn closest_pitch_index(&self, freq: f32) -> usize {
        self.pitches
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let diff_a = (a.frequency - freq).abs();
                let diff_b = (b.frequency - freq).abs();
                diff_a.total_cmp(&diff_b)
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    pub fn closest_pitch(&self, freq: f32) -> &Pitch {
        &self.pitches[self.closest_pitch_index(freq)]
    }
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat; 100 cents is one
/// semitone.
pub fn cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Checks whether a deviation counts as in tune.
///
/// # Arguments
/// * `cents` - Deviation from the target, as returned by [`cents_deviation`]
///
/// # Returns
/// * `true` - Strictly within [`IN_TUNE_CENTS`] either side of the target
/// * `false` - Far enough off to need adjusting
pub fn is_in_tune(cents: f32) -> bool {
    cents.abs() < IN_TUNE_CENTS
}
