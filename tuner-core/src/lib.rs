// tuner-core/src/lib.rs

//! The core logic for the guitar tuner.
//! This crate is responsible for audio capture, frame gating, pitch
//! estimation and frame-to-frame stability filtering. It is completely
//! headless and contains no display code.

pub mod audio;
pub mod config;
pub mod error;
pub mod gate;
pub mod pipeline;
pub mod pitch;
pub mod stability;
pub mod synth;
pub mod tuning;

use serde::Serialize;

pub use config::PipelineConfig;
pub use error::{Result, TunerError};
pub use pipeline::{StopHandle, Tuner, TunerState};

/// A single accepted pitch reading, published once per analyzed frame
/// that survives the stability filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PitchEstimate {
    /// The estimated fundamental frequency in Hz. Always finite and positive.
    pub frequency: f32,
    /// Mean absolute sample magnitude of the frame, on the 16-bit scale.
    pub intensity: f64,
}
