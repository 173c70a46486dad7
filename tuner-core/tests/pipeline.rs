use std::collections::VecDeque;
use std::f64::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use approx::assert_abs_diff_eq;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tuner_core::audio::CaptureSource;
use tuner_core::pipeline::{FrameOutcome, FrameProcessor};
use tuner_core::synth::SineSource;
use tuner_core::{PipelineConfig, Result, Tuner, TunerError, TunerState};

const WAIT: Duration = Duration::from_secs(5);

fn tone(freq: f64, len: usize) -> Vec<i16> {
    (0..len)
        .map(|i| (6000.0 * (2.0 * PI * freq * i as f64 / 44100.0).sin()) as i16)
        .collect()
}

/// Replays canned reads; an empty entry reads as "no data".
struct ScriptedSource {
    reads: VecDeque<Vec<i16>>,
    released: Arc<AtomicBool>,
}

impl CaptureSource for ScriptedSource {
    fn initialize(&mut self, sample_rates: &[u32]) -> Result<u32> {
        Ok(sample_rates[0])
    }

    fn read(&mut self, buffer: &mut [i16]) -> isize {
        match self.reads.pop_front() {
            Some(frame) if frame.is_empty() => 0,
            Some(frame) => {
                let n = frame.len().min(buffer.len());
                buffer[..n].copy_from_slice(&frame[..n]);
                n as isize
            }
            None => {
                std::thread::sleep(Duration::from_millis(5));
                -1
            }
        }
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }

    fn sample_rate(&self) -> Option<u32> {
        Some(44100)
    }
}

/// Signals when `initialize` is entered, then blocks until the test lets it
/// continue.
struct GatedInitSource {
    entered: Sender<()>,
    proceed: Receiver<()>,
    released: Arc<AtomicBool>,
}

impl CaptureSource for GatedInitSource {
    fn initialize(&mut self, sample_rates: &[u32]) -> Result<u32> {
        let _ = self.entered.send(());
        let _ = self.proceed.recv();
        Ok(sample_rates[0])
    }

    fn read(&mut self, _buffer: &mut [i16]) -> isize {
        panic!("read must not be called after a stop during initialization");
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }

    fn sample_rate(&self) -> Option<u32> {
        None
    }
}

#[test]
fn steady_tone_converges_and_stays_stable() {
    let config = PipelineConfig::default();
    let mut source = SineSource::new(220.0, 8000.0);
    let rate = source.initialize(&config.sample_rates).unwrap();
    assert_eq!(rate, 44100);

    let mut processor = FrameProcessor::new(config.clone());
    let mut buffer = vec![0i16; config.frame_length];

    assert_eq!(source.read(&mut buffer), 8192);
    assert!(matches!(
        processor.process(&buffer, rate),
        FrameOutcome::Suppressed { .. }
    ));

    let mut previous = processor.last_computed_frequency();
    for _ in 0..10 {
        source.read(&mut buffer);
        match processor.process(&buffer, rate) {
            FrameOutcome::Accepted(estimate) => {
                assert_abs_diff_eq!(estimate.frequency, 220.0, epsilon = 1.0);
                assert!((estimate.frequency - previous).abs() <= 5.0);
                assert!(estimate.intensity >= 50.0);
                previous = estimate.frequency;
            }
            other => panic!("expected a stable estimate, got {other:?}"),
        }
    }
}

#[test]
fn tuner_publishes_estimates_from_worker() {
    let (mut tuner, estimates) = Tuner::new(PipelineConfig::default()).unwrap();
    assert_eq!(tuner.state(), TunerState::Idle);

    let rate = tuner.start(|| SineSource::new(220.0, 8000.0)).unwrap();
    assert_eq!(rate, 44100);
    assert_eq!(tuner.state(), TunerState::Capturing);
    assert_eq!(tuner.sample_rate(), Some(44100));

    for _ in 0..10 {
        let estimate = estimates.recv_timeout(WAIT).unwrap();
        assert_abs_diff_eq!(estimate.frequency, 220.0, epsilon = 1.0);
    }

    tuner.stop().unwrap();
    assert_eq!(tuner.state(), TunerState::Stopped);
}

#[test]
fn start_is_idempotent_while_capturing() {
    let (mut tuner, _estimates) = Tuner::new(PipelineConfig::default()).unwrap();
    assert_eq!(tuner.start(|| SineSource::new(196.0, 8000.0)).unwrap(), 44100);

    let second = tuner.start(|| SineSource::new(196.0, 8000.0).with_supported_rates(&[8000]));
    assert_eq!(second.unwrap(), 44100);
    tuner.stop().unwrap();
}

#[test]
fn negotiates_lower_rate() {
    let (mut tuner, estimates) = Tuner::new(PipelineConfig::default()).unwrap();
    let rate = tuner
        .start(|| SineSource::new(82.41, 8000.0).with_supported_rates(&[16000, 8000]))
        .unwrap();
    assert_eq!(rate, 16000);

    let estimate = estimates.recv_timeout(WAIT).unwrap();
    assert_abs_diff_eq!(estimate.frequency, 82.41, epsilon = 1.0);
}

#[test]
fn initialization_failure_is_reported() {
    let (mut tuner, estimates) = Tuner::new(PipelineConfig::default()).unwrap();
    let result = tuner.start(|| SineSource::new(220.0, 8000.0).with_supported_rates(&[96000]));

    match result {
        Err(TunerError::NoUsableSampleRate { tried }) => {
            assert_eq!(tried, vec![44100, 22050, 16000, 11025, 8000]);
        }
        other => panic!("expected NoUsableSampleRate, got {other:?}"),
    }
    assert_eq!(tuner.state(), TunerState::Stopped);
    assert_eq!(
        estimates.recv_timeout(WAIT),
        Err(RecvTimeoutError::Disconnected)
    );
}

#[test]
fn stopped_tuner_cannot_restart() {
    let (mut tuner, _estimates) = Tuner::new(PipelineConfig::default()).unwrap();
    tuner.start(|| SineSource::new(220.0, 8000.0)).unwrap();
    tuner.stop().unwrap();
    tuner.stop().unwrap();

    let result = tuner.start(|| SineSource::new(220.0, 8000.0));
    assert!(matches!(result, Err(TunerError::Stopped)));
}

#[test]
fn stop_before_start_prevents_capture() {
    let (mut tuner, _estimates) = Tuner::new(PipelineConfig::default()).unwrap();
    tuner.stop().unwrap();
    assert_eq!(tuner.state(), TunerState::Stopped);
    assert!(matches!(
        tuner.start(|| SineSource::new(220.0, 8000.0)),
        Err(TunerError::Stopped)
    ));
}

#[test]
fn stop_during_initialization_releases_source() {
    let (mut tuner, _estimates) = Tuner::new(PipelineConfig::default()).unwrap();
    let stop = tuner.stop_handle();
    let released = Arc::new(AtomicBool::new(false));
    let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
    let (proceed_tx, proceed_rx) = crossbeam_channel::bounded(0);

    let helper = std::thread::spawn(move || {
        entered_rx.recv().unwrap();
        stop.stop();
        proceed_tx.send(()).unwrap();
    });

    let source_released = released.clone();
    let result = tuner.start(move || GatedInitSource {
        entered: entered_tx,
        proceed: proceed_rx,
        released: source_released,
    });
    helper.join().unwrap();

    assert!(matches!(result, Err(TunerError::Stopped)));
    assert!(released.load(Ordering::SeqCst));
    assert_eq!(tuner.state(), TunerState::Stopped);
}

#[test]
fn empty_reads_are_skipped() {
    let released = Arc::new(AtomicBool::new(false));
    let frame = tone(110.0, 8192);
    let reads = VecDeque::from(vec![
        Vec::new(),
        frame.clone(),
        Vec::new(),
        vec![0i16; 8192],
        frame.clone(),
        frame,
    ]);

    let (mut tuner, estimates) = Tuner::new(PipelineConfig::default()).unwrap();
    let source_released = released.clone();
    tuner
        .start(move || ScriptedSource {
            reads,
            released: source_released,
        })
        .unwrap();

    let first = estimates.recv_timeout(WAIT).unwrap();
    let second = estimates.recv_timeout(WAIT).unwrap();
    assert_abs_diff_eq!(first.frequency, 110.0, epsilon = 1.0);
    assert_eq!(first, second);

    tuner.stop().unwrap();
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn quiet_input_publishes_nothing() {
    let (mut tuner, estimates) = Tuner::new(PipelineConfig::default()).unwrap();
    tuner
        .start(|| SineSource::new(220.0, 40.0).with_realtime(true))
        .unwrap();

    assert_eq!(
        estimates.recv_timeout(Duration::from_millis(600)),
        Err(RecvTimeoutError::Timeout)
    );
    tuner.stop().unwrap();
}

#[test]
fn dropping_the_receiver_ends_the_session() {
    let (mut tuner, estimates) = Tuner::new(PipelineConfig::default()).unwrap();
    tuner.start(|| SineSource::new(220.0, 8000.0)).unwrap();
    drop(estimates);

    let deadline = Instant::now() + WAIT;
    while tuner.state() != TunerState::Stopped && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(tuner.state(), TunerState::Stopped);
    tuner.stop().unwrap();
}
