//! Formatting of published estimates against the selected tuning.

use std::fmt;

use serde::Serialize;
use tuner_core::PitchEstimate;
use tuner_core::tuning::{self, Tuning};

/// One estimate mapped onto the closest string of a tuning.
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub frequency: f32,
    pub intensity: f64,
    pub string: &'static str,
    pub target: f32,
    pub cents: f32,
    pub in_tune: bool,
}

impl Reading {
    pub fn new(estimate: PitchEstimate, tuning: &Tuning) -> Self {
        let pitch = tuning.closest_pitch(estimate.frequency);
        let cents = tuning::cents_deviation(estimate.frequency, pitch.frequency);
        Self {
            frequency: estimate.frequency,
            intensity: estimate.intensity,
            string: pitch.name,
            target: pitch.frequency,
            cents,
            in_tune: tuning::is_in_tune(cents),
        }
    }

    fn hint(&self) -> &'static str {
        if self.in_tune {
            "in tune"
        } else if self.cents < 0.0 {
            "tune up"
        } else {
            "tune down"
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>7.2} Hz  {:<3} ({:.2} Hz)  {:+6.1} cents  {}",
            self.frequency,
            self.string,
            self.target,
            self.cents,
            self.hint()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuner_core::tuning::tuning_by_name;

    fn reading(frequency: f32) -> Reading {
        let standard = tuning_by_name("standard").unwrap();
        Reading::new(
            PitchEstimate {
                frequency,
                intensity: 1200.0,
            },
            standard,
        )
    }

    #[test]
    fn maps_to_closest_string() {
        let r = reading(111.0);
        assert_eq!(r.string, "A2");
        assert_eq!(r.target, 110.0);
        assert!(r.cents > 0.0);
        assert!(!r.in_tune);
    }

    #[test]
    fn formats_hint() {
        assert!(reading(110.1).to_string().ends_with("in tune"));
        assert!(reading(105.0).to_string().ends_with("tune up"));
        assert!(reading(200.0).to_string().ends_with("tune down"));
    }

    #[test]
    fn serializes_as_flat_json() {
        let json = serde_json::to_value(reading(82.41)).unwrap();
        assert_eq!(json["string"], "E2");
        assert_eq!(json["in_tune"], true);
    }
}
