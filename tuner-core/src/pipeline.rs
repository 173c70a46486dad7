//! # Processing Loop Module
//!
//! Drives the capture → gate → estimate → filter → publish sequence on a
//! dedicated worker thread and exposes the session lifecycle.
//!
//! ## Architecture
//! - **Worker Thread**: creates and initializes the capture source, then
//!   reads and analyzes one frame per iteration
//! - **Communication**: accepted estimates go out on a bounded crossbeam
//!   channel; a full channel drops the estimate
//! - **Cancellation**: a shared stop flag, checked between iterations
//!
//! A [`Tuner`] moves `Idle → Capturing → Stopped` and is not restartable.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, error, info, trace};

use crate::PitchEstimate;
use crate::audio::{CaptureSource, CpalCapture};
use crate::config::PipelineConfig;
use crate::error::{Result, TunerError};
use crate::gate::{self, GateDecision};
use crate::pitch;
use crate::stability::StabilityFilter;

/// Lifecycle of a tuning session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunerState {
    Idle,
    Capturing,
    Stopped,
}

/// What happened to one read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// The source returned no samples.
    Skipped,
    /// The gate rejected the frame before estimation.
    Gated(GateDecision),
    /// The estimator could not produce a frequency.
    Unpitched,
    /// Estimated, but too far from the previous estimate to publish.
    Suppressed { frequency: f32 },
    /// Estimated and published.
    Accepted(PitchEstimate),
}

/// Per-session analysis state: the gate and estimator are stateless, the
/// stability filter carries the last computed frequency between frames.
#[derive(Debug, Clone)]
pub struct FrameProcessor {
    config: PipelineConfig,
    filter: StabilityFilter,
}

impl FrameProcessor {
    pub fn new(config: PipelineConfig) -> Self {
        let filter = StabilityFilter::new(config.max_jump);
        Self { config, filter }
    }

    /// Analyzes one frame of `samples` captured at `sample_rate`.
    pub fn process(&mut self, samples: &[i16], sample_rate: u32) -> FrameOutcome {
        if samples.is_empty() {
            return FrameOutcome::Skipped;
        }

        let intensity = match gate::evaluate(samples, sample_rate, &self.config) {
            GateDecision::Pass { intensity } => intensity,
            rejected => return FrameOutcome::Gated(rejected),
        };

        let window = samples.len() / 4;
        let Some(frequency) = pitch::detect_pitch_asdf(
            samples,
            window,
            sample_rate,
            self.config.min_frequency,
            self.config.max_frequency,
        ) else {
            return FrameOutcome::Unpitched;
        };

        if self.filter.accept(frequency) {
            FrameOutcome::Accepted(PitchEstimate {
                frequency,
                intensity,
            })
        } else {
            FrameOutcome::Suppressed { frequency }
        }
    }

    pub fn last_computed_frequency(&self) -> f32 {
        self.filter.last_computed_frequency()
    }
}

/// Cloneable handle for requesting a stop from any thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why the capture loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    StopRequested,
    ReceiverDropped,
}

/// Runs the read/analyze loop until a stop is requested or every receiver
/// of `sender` is gone. The source is left for the caller to release.
pub fn run_capture_loop<S: CaptureSource + ?Sized>(
    source: &mut S,
    sample_rate: u32,
    processor: &mut FrameProcessor,
    sender: &Sender<PitchEstimate>,
    stop: &StopHandle,
    frame_length: usize,
) -> LoopExit {
    let mut buffer = vec![0i16; frame_length];

    while !stop.is_stop_requested() {
        let read = source.read(&mut buffer);
        if read <= 0 {
            trace!(read, "No samples this cycle");
            continue;
        }
        let read = (read as usize).min(buffer.len());

        match processor.process(&buffer[..read], sample_rate) {
            FrameOutcome::Accepted(estimate) => match sender.try_send(estimate) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(frequency = estimate.frequency, "Estimate channel full, dropping");
                }
                Err(TrySendError::Disconnected(_)) => {
                    info!("All estimate receivers dropped");
                    return LoopExit::ReceiverDropped;
                }
            },
            FrameOutcome::Suppressed { frequency } => {
                debug!(frequency, "Estimate suppressed by stability filter");
            }
            FrameOutcome::Gated(decision) => debug!(?decision, "Frame rejected by gate"),
            FrameOutcome::Unpitched => debug!("No pitch found in frame"),
            FrameOutcome::Skipped => {}
        }
    }
    LoopExit::StopRequested
}

/// A tuning session: owns the worker thread and the stop flag.
#[derive(Debug)]
pub struct Tuner {
    config: PipelineConfig,
    state: TunerState,
    stop: StopHandle,
    sender: Option<Sender<PitchEstimate>>,
    worker: Option<JoinHandle<()>>,
    sample_rate: Option<u32>,
}

impl Tuner {
    /// Creates an idle tuner and the receiving end of its estimate channel.
    pub fn new(config: PipelineConfig) -> Result<(Self, Receiver<PitchEstimate>)> {
        config.validate()?;
        let (sender, receiver) = crossbeam_channel::bounded(config.channel_capacity);
        let tuner = Self {
            config,
            state: TunerState::Idle,
            stop: StopHandle::default(),
            sender: Some(sender),
            worker: None,
            sample_rate: None,
        };
        Ok((tuner, receiver))
    }

    /// The validated configuration this tuner was created with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The current lifecycle state. A worker that ended on its own (all
    /// receivers dropped) reports `Stopped`.
    pub fn state(&self) -> TunerState {
        match self.state {
            TunerState::Capturing if self.worker.as_ref().is_some_and(|w| w.is_finished()) => {
                TunerState::Stopped
            }
            state => state,
        }
    }

    /// The negotiated sample rate while capturing.
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Returns a handle that stops this tuner from any thread.
    ///
    /// The handle shares the tuner's stop flag, so a stop requested through
    /// it before `start` makes `start` fail with `TunerError::Stopped`, and
    /// one requested while capturing ends the worker loop at its next
    /// iteration. Call [`Tuner::stop`] afterwards to join the worker.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Starts capturing from the default microphone.
    pub fn start_microphone(&mut self) -> Result<u32> {
        let config = self.config.clone();
        self.start(move || CpalCapture::new(&config))
    }

    /// Spawns the worker, which builds a source with `make_source` and
    /// initializes it. Blocks until initialization finishes and returns the
    /// negotiated sample rate.
    ///
    /// Calling `start` while capturing returns the current rate. Initialization
    /// failure, or a stop requested before it completes, leaves the tuner
    /// `Stopped`.
    pub fn start<F, S>(&mut self, make_source: F) -> Result<u32>
    where
        F: FnOnce() -> S + Send + 'static,
        S: CaptureSource,
    {
        self.start_with(make_source, spawn_worker)
    }

    fn start_with<F, S, W>(&mut self, make_source: F, spawn: W) -> Result<u32>
    where
        F: FnOnce() -> S + Send + 'static,
        S: CaptureSource,
        W: FnOnce(Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>>,
    {
        match self.state() {
            TunerState::Capturing => {
                if let Some(rate) = self.sample_rate {
                    return Ok(rate);
                }
            }
            TunerState::Stopped => return Err(TunerError::Stopped),
            TunerState::Idle => {}
        }
        // The sender stays with the tuner until a worker exists to own it.
        let Some(sender) = self.sender.clone() else {
            return Err(TunerError::Stopped);
        };
        if self.stop.is_stop_requested() {
            self.state = TunerState::Stopped;
            return Err(TunerError::Stopped);
        }

        let (init_tx, init_rx) = crossbeam_channel::bounded::<Result<u32>>(1);
        let config = self.config.clone();
        let stop = self.stop.clone();

        info!("Starting audio worker...");
        let handle = spawn(Box::new(move || {
            let mut source = make_source();
            let rate = match source.initialize(&config.sample_rates) {
                Ok(rate) => rate,
                Err(e) => {
                    error!("Fatal error starting audio: {}", e);
                    let _ = init_tx.send(Err(e));
                    return;
                }
            };

            if stop.is_stop_requested() {
                info!("Stop requested during initialization");
                source.release();
                let _ = init_tx.send(Err(TunerError::Stopped));
                return;
            }
            let _ = init_tx.send(Ok(rate));

            let mut processor = FrameProcessor::new(config.clone());
            let exit = run_capture_loop(
                &mut source,
                rate,
                &mut processor,
                &sender,
                &stop,
                config.frame_length,
            );

            source.release();
            info!(?exit, "Audio worker finished");
        }))?;
        self.sender = None;

        match init_rx.recv() {
            Ok(Ok(rate)) => {
                self.state = TunerState::Capturing;
                self.sample_rate = Some(rate);
                self.worker = Some(handle);
                info!(rate, "Tuner capturing");
                Ok(rate)
            }
            Ok(Err(e)) => {
                self.state = TunerState::Stopped;
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                self.state = TunerState::Stopped;
                let _ = handle.join();
                Err(TunerError::WorkerPanicked)
            }
        }
    }

    /// Requests a stop and waits for the worker to release the source.
    /// Safe to call in any state, any number of times.
    pub fn stop(&mut self) -> Result<()> {
        self.stop.stop();
        self.sender = None;
        self.state = TunerState::Stopped;
        self.sample_rate = None;

        if let Some(handle) = self.worker.take() {
            debug!("Waiting for audio worker to finish...");
            handle.join().map_err(|_| TunerError::WorkerPanicked)?;
        }
        Ok(())
    }
}

fn spawn_worker(work: Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name("tuner-audio".into()).spawn(work)
}

impl Drop for Tuner {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Error stopping tuner: {}", e);
        }
    }
}
