//! Frame-to-frame stability filter.
//!
//! An estimate is published only when it lands within `max_jump` Hz of the
//! previous frame's estimate. The previous value is always replaced, so a
//! new pitch that holds for two consecutive frames is published from the
//! second frame on, while a single-frame outlier is dropped.

#[derive(Debug, Clone)]
pub struct StabilityFilter {
    last_computed_frequency: f32,
    max_jump: f32,
}

impl StabilityFilter {
    /// Creates a filter with no previous estimate.
    ///
    /// # Arguments
    /// * `max_jump` - Largest change in Hz, inclusive, between consecutive
    ///   estimates that still counts as stable
    ///
    /// The previous estimate starts at 0 Hz, so the first estimate of a
    /// session is never published.
    pub fn new(max_jump: f32) -> Self {
        Self {
            last_computed_frequency: 0.0,
            max_jump,
        }
    }

    /// Records `frequency` as the latest computed estimate and reports
    /// whether it should be published.
    ///
    /// # Arguments
    /// * `frequency` - Estimate for the current frame, in Hz
    ///
    /// # Returns
    /// * `true` - Within `max_jump` of the previous estimate; publish it
    /// * `false` - A jump; suppressed, but still remembered for the next frame
    pub fn accept(&mut self, frequency: f32) -> bool {
        let stable = (frequency - self.last_computed_frequency).abs() <= self.max_jump;
        self.last_computed_frequency = frequency;
        stable
    }

    pub fn last_computed_frequency(&self) -> f32 {
        self.last_computed_frequency
    }
}
