//! # Audio Capture Module
//!
//! This module defines the [`CaptureSource`] contract the processing loop
//! reads frames through, and a microphone implementation built on CPAL
//! (Cross-Platform Audio Library).
//!
//! ## Features
//! - Sample rate negotiation over a descending list of candidates
//! - Mono 16-bit delivery regardless of the device's native format
//! - Blocking reads on top of CPAL's callback model
//! - Explicit release of the device

use std::collections::VecDeque;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample, SupportedBufferSize, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{Result, TunerError};

/// Samples per chunk handed from the CPAL callback to the reader.
const CHUNK_SIZE: usize = 1024;

/// A supplier of mono 16-bit PCM frames.
///
/// Sources are created and used on the processing worker thread, so they
/// need not be `Send`.
pub trait CaptureSource {
    /// Opens the device at the first usable rate in `sample_rates` and
    /// returns the rate chosen.
    fn initialize(&mut self, sample_rates: &[u32]) -> Result<u32>;

    /// Blocks until `buffer` can be filled and returns the number of
    /// samples written. Zero or a negative value means no data this cycle.
    fn read(&mut self, buffer: &mut [i16]) -> isize;

    /// Stops capture and frees the device. Calling it twice is harmless.
    fn release(&mut self);

    /// The negotiated sample rate, once initialized.
    fn sample_rate(&self) -> Option<u32>;
}

/// Size of the internal sample buffer for a device reporting
/// `min_buffer` as its minimum buffer size.
pub fn internal_buffer_size(min_buffer: usize, floor: usize) -> usize {
    floor.max(min_buffer.saturating_mul(4))
}

/// Microphone capture from the default input device.
pub struct CpalCapture {
    min_internal_buffer: usize,
    read_timeout: Duration,
    stream: Option<cpal::Stream>,
    receiver: Option<Receiver<Vec<i16>>>,
    pending: VecDeque<i16>,
    sample_rate: Option<u32>,
}

impl CpalCapture {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            min_internal_buffer: config.min_internal_buffer,
            read_timeout: Duration::from_millis(config.read_timeout_ms),
            stream: None,
            receiver: None,
            pending: VecDeque::new(),
            sample_rate: None,
        }
    }

    fn open_stream(
        &mut self,
        device: &cpal::Device,
        supported: SupportedStreamConfigRange,
        rate: u32,
    ) -> Result<()> {
        let min_buffer = match supported.buffer_size() {
            SupportedBufferSize::Range { min, .. } => *min as usize,
            SupportedBufferSize::Unknown => 0,
        };
        let internal = internal_buffer_size(min_buffer, self.min_internal_buffer);
        let (sender, receiver) = crossbeam_channel::bounded((internal / CHUNK_SIZE).max(1));

        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported
            .with_sample_rate(cpal::SampleRate(rate))
            .into();
        let channels = config.channels as usize;

        let stream = match sample_format {
            cpal::SampleFormat::I16 => build_stream::<i16>(device, &config, channels, sender)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(device, &config, channels, sender)?,
            cpal::SampleFormat::I32 => build_stream::<i32>(device, &config, channels, sender)?,
            cpal::SampleFormat::F32 => build_stream::<f32>(device, &config, channels, sender)?,
            other => {
                return Err(TunerError::Device(format!(
                    "Unsupported sample format {other:?}"
                )));
            }
        };
        stream.play()?;

        info!(
            rate,
            channels,
            ?sample_format,
            internal_buffer = internal,
            "Audio capture started"
        );
        self.stream = Some(stream);
        self.receiver = Some(receiver);
        self.sample_rate = Some(rate);
        Ok(())
    }
}

impl CaptureSource for CpalCapture {
    fn initialize(&mut self, sample_rates: &[u32]) -> Result<u32> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(TunerError::NoInputDevice)?;

        match device.name() {
            Ok(name) => info!("Using audio input device: {}", name),
            Err(e) => warn!("Could not read input device name: {}", e),
        }

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        for &rate in sample_rates {
            let Some(supported) = find_supported_config(&configs, rate) else {
                debug!(rate, "No input config supports this rate");
                continue;
            };
            match self.open_stream(&device, supported, rate) {
                Ok(()) => return Ok(rate),
                Err(e) => warn!(rate, "Could not open input stream: {}", e),
            }
        }

        Err(TunerError::NoUsableSampleRate {
            tried: sample_rates.to_vec(),
        })
    }

    fn read(&mut self, buffer: &mut [i16]) -> isize {
        let Some(receiver) = &self.receiver else {
            return -1;
        };

        while self.pending.len() < buffer.len() {
            match receiver.recv_timeout(self.read_timeout) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => return 0,
                Err(RecvTimeoutError::Disconnected) => return -1,
            }
        }

        let n = buffer.len();
        for (slot, sample) in buffer.iter_mut().zip(self.pending.drain(..n)) {
            *slot = sample;
        }
        n as isize
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                error!("Error pausing stream: {}", e);
            }
            drop(stream);
            info!("Audio capture released");
        }
        self.receiver = None;
        self.pending.clear();
    }

    fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.release();
    }
}

/// Builds an input stream that downmixes to mono, converts to `i16` and
/// hands fixed-size chunks to `sender`. Chunks are dropped when the reader
/// falls behind.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    sender: Sender<Vec<i16>>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let mut chunk = Vec::with_capacity(CHUNK_SIZE * 2);

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            downmix_to_mono(data, channels, &mut chunk);
            while chunk.len() >= CHUNK_SIZE {
                let rest = chunk.split_off(CHUNK_SIZE);
                let full = std::mem::replace(&mut chunk, rest);
                let _ = sender.try_send(full);
            }
        },
        |err| error!("An error occurred on the audio stream: {}", err),
        None,
    )?;
    Ok(stream)
}

/// Averages each interleaved frame of `data` into one `i16` sample and
/// appends it to `out`.
///
/// # Arguments
/// * `data` - Interleaved samples in the device's native format
/// * `channels` - Samples per frame; 0 is treated as mono
/// * `out` - Destination, appended to
fn downmix_to_mono<T>(data: &[T], channels: usize, out: &mut Vec<i16>)
where
    T: Sample,
    i16: FromSample<T>,
{
    for frame in data.chunks(channels.max(1)) {
        let sum: i32 = frame.iter().map(|&s| i16::from_sample(s) as i32).sum();
        out.push((sum / frame.len() as i32) as i16);
    }
}

/// Finds the best supported input configuration covering `rate`.
///
/// Prefers fewer channels, then native 16-bit samples.
fn find_supported_config(
    configs: &[SupportedStreamConfigRange],
    rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .iter()
        .filter(|c| c.min_sample_rate().0 <= rate && rate <= c.max_sample_rate().0)
        .min_by_key(|c| (c.channels(), c.sample_format() != cpal::SampleFormat::I16))
        .cloned()
}
