//! # Pipeline Configuration
//!
//! Every tunable constant of the capture and analysis pipeline lives here.
//! The defaults reproduce the reference tuner configuration (8192-sample
//! frames, 44.1 kHz preferred, 50–500 Hz search band). Configs can be saved
//! to and loaded from JSON files.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};

/// Sample rates probed in order during capture initialization.
pub const DEFAULT_SAMPLE_RATES: [u32; 5] = [44100, 22050, 16000, 11025, 8000];

/// Number of samples requested per read.
pub const DEFAULT_FRAME_LENGTH: usize = 8192;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Candidate capture rates, most preferred first.
    pub sample_rates: Vec<u32>,
    /// Samples requested per blocking read.
    pub frame_length: usize,
    /// Lower bound for the capture source's internal buffer, in samples.
    pub min_internal_buffer: usize,
    /// Frames with a lower mean absolute magnitude are treated as silence.
    pub min_intensity: f64,
    /// Zero-crossing ceiling at the reference frame length and rate.
    pub base_zero_crossings: f64,
    pub reference_frame_length: usize,
    pub reference_sample_rate: u32,
    /// Search band for the fundamental, in Hz.
    pub min_frequency: f32,
    pub max_frequency: f32,
    /// Largest frame-to-frame change (Hz) that is published.
    pub max_jump: f32,
    /// Capacity of the estimate channel.
    pub channel_capacity: usize,
    /// How long a single read may wait for samples before reporting none.
    pub read_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rates: DEFAULT_SAMPLE_RATES.to_vec(),
            frame_length: DEFAULT_FRAME_LENGTH,
            min_internal_buffer: 16384,
            min_intensity: 50.0,
            base_zero_crossings: 250.0,
            reference_frame_length: DEFAULT_FRAME_LENGTH,
            reference_sample_rate: 44100,
            min_frequency: 50.0,
            max_frequency: 500.0,
            max_jump: 5.0,
            channel_capacity: 64,
            read_timeout_ms: 250,
        }
    }
}

impl PipelineConfig {
    /// Loads a config from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the config as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rates.is_empty() {
            return Err(TunerError::Config("sample_rates must not be empty".into()));
        }
        if self.sample_rates.contains(&0) {
            return Err(TunerError::Config("sample rates must be positive".into()));
        }
        if self.frame_length < 4 {
            return Err(TunerError::Config(format!(
                "frame_length {} is too short",
                self.frame_length
            )));
        }
        if self.reference_frame_length == 0 || self.reference_sample_rate == 0 {
            return Err(TunerError::Config(
                "reference frame length and rate must be positive".into(),
            ));
        }
        if !(self.min_frequency > 0.0 && self.min_frequency < self.max_frequency) {
            return Err(TunerError::Config(format!(
                "invalid frequency band [{}, {}]",
                self.min_frequency, self.max_frequency
            )));
        }
        if self.max_jump < 0.0 {
            return Err(TunerError::Config("max_jump must not be negative".into()));
        }
        if self.channel_capacity == 0 {
            return Err(TunerError::Config("channel_capacity must be at least 1".into()));
        }
        Ok(())
    }
}
