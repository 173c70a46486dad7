//! Error types for the tuner pipeline.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TunerError>;

#[derive(Debug, Error)]
pub enum TunerError {
    #[error("No input device available")]
    NoInputDevice,

    #[error("No usable sample rate for mono 16-bit capture (tried {tried:?})")]
    NoUsableSampleRate { tried: Vec<u32> },

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Tuner was stopped and cannot be restarted")]
    Stopped,

    #[error("Audio worker panicked")]
    WorkerPanicked,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<cpal::SupportedStreamConfigsError> for TunerError {
    fn from(err: cpal::SupportedStreamConfigsError) -> Self {
        TunerError::Device(err.to_string())
    }
}

impl From<cpal::BuildStreamError> for TunerError {
    fn from(err: cpal::BuildStreamError) -> Self {
        TunerError::Device(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for TunerError {
    fn from(err: cpal::PlayStreamError) -> Self {
        TunerError::Device(err.to_string())
    }
}
