//! Synthetic capture source.
//!
//! Generates a continuous sine tone so the pipeline can run without audio
//! hardware, for tests and the command-line `--simulate` mode.

use std::f64::consts::TAU;
use std::time::Duration;

use tracing::info;

use crate::audio::CaptureSource;
use crate::error::{Result, TunerError};

#[derive(Debug, Clone)]
pub struct SineSource {
    frequency: f64,
    amplitude: f64,
    supported_rates: Vec<u32>,
    realtime: bool,
    phase: f64,
    sample_rate: Option<u32>,
}

impl SineSource {
    /// A tone at `frequency` Hz with the given peak amplitude on the
    /// 16-bit scale. Every sample rate is accepted.
    pub fn new(frequency: f64, amplitude: f64) -> Self {
        Self {
            frequency,
            amplitude: amplitude.clamp(0.0, i16::MAX as f64),
            supported_rates: Vec::new(),
            realtime: false,
            phase: 0.0,
            sample_rate: None,
        }
    }

    /// Restricts initialization to `rates`, so rate negotiation can be
    /// exercised. An empty list accepts every rate.
    pub fn with_supported_rates(mut self, rates: &[u32]) -> Self {
        self.supported_rates = rates.to_vec();
        self
    }

    /// Makes each read sleep for the duration of the audio it returns.
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    fn supports(&self, rate: u32) -> bool {
        rate > 0 && (self.supported_rates.is_empty() || self.supported_rates.contains(&rate))
    }
}

impl CaptureSource for SineSource {
    fn initialize(&mut self, sample_rates: &[u32]) -> Result<u32> {
        let rate = sample_rates
            .iter()
            .copied()
            .find(|&rate| self.supports(rate))
            .ok_or_else(|| TunerError::NoUsableSampleRate {
                tried: sample_rates.to_vec(),
            })?;
        info!(rate, frequency = self.frequency, "Synthetic tone started");
        self.sample_rate = Some(rate);
        self.phase = 0.0;
        Ok(rate)
    }

    fn read(&mut self, buffer: &mut [i16]) -> isize {
        let Some(rate) = self.sample_rate else {
            return -1;
        };

        let step = TAU * self.frequency / rate as f64;
        for slot in buffer.iter_mut() {
            *slot = (self.amplitude * self.phase.sin()).round() as i16;
            self.phase = (self.phase + step) % TAU;
        }

        if self.realtime {
            std::thread::sleep(Duration::from_secs_f64(buffer.len() as f64 / rate as f64));
        }
        buffer.len() as isize
    }

    fn release(&mut self) {
        self.sample_rate = None;
    }

    fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }
}
