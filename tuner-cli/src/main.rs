//! # Tuner - command-line front end
//!
//! Runs a tuning session against the default microphone (or a synthetic
//! tone) and prints each published estimate together with the closest
//! string of the chosen tuning.
//!
//! ## Architecture
//! - **Audio Thread**: owned by `tuner_core::Tuner`
//! - **Main Thread**: drains the estimate channel and prints readings
//! - **Stop**: Enter/EOF on stdin, or `--duration`

mod display;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser};
use crossbeam_channel::RecvTimeoutError;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;
use tuner_core::synth::SineSource;
use tuner_core::{PipelineConfig, Tuner, tuning};

use display::Reading;

#[derive(Debug, Parser)]
#[command(name = "tuner", version, about = "Real-time guitar tuner")]
struct Args {
    /// Pipeline config (JSON). Missing fields use defaults.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the effective config to PATH and exit.
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,

    /// Tuning to compare against.
    #[arg(long, default_value = "standard")]
    tuning: String,

    /// List the known tunings and exit.
    #[arg(long)]
    list_tunings: bool,

    /// Analyze a synthetic tone at HZ instead of the microphone.
    #[arg(long, value_name = "HZ")]
    simulate: Option<f64>,

    /// Peak amplitude of the synthetic tone (16-bit scale).
    #[arg(long, default_value_t = 8000.0, requires = "simulate")]
    amplitude: f64,

    /// Stop after this many seconds instead of waiting for Enter.
    #[arg(long, value_name = "SECS")]
    duration: Option<f64>,

    /// Print one JSON object per reading.
    #[arg(long)]
    json: bool,

    /// More logging (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.list_tunings {
        for name in tuning::tuning_names() {
            println!("{name}");
        }
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(path) = &args.write_config {
        config
            .save(path)
            .with_context(|| format!("writing config to {}", path.display()))?;
        return Ok(());
    }

    let tuning = tuning::tuning_by_name(&args.tuning)
        .ok_or_else(|| anyhow!("unknown tuning '{}' (see --list-tunings)", args.tuning))?;

    let deadline = match args.duration {
        Some(secs) if secs <= 0.0 || !secs.is_finite() => {
            bail!("--duration must be a positive number of seconds")
        }
        Some(secs) => Some(Instant::now() + Duration::from_secs_f64(secs)),
        None => None,
    };

    let (mut tuner, estimates) = Tuner::new(config)?;
    let rate = match args.simulate {
        Some(frequency) => {
            let amplitude = args.amplitude;
            tuner.start(move || SineSource::new(frequency, amplitude).with_realtime(true))
        }
        None => tuner.start_microphone(),
    }
    .context("starting audio capture")?;
    info!(rate, tuning = tuning.name, "Listening");

    let stop = tuner.stop_handle();
    if deadline.is_none() {
        eprintln!("Listening at {rate} Hz ({}). Press Enter to stop.", tuning.name);
        let stdin_stop = stop.clone();
        thread::spawn(move || {
            let mut line = String::new();
            let _ = io::stdin().lock().read_line(&mut line);
            stdin_stop.stop();
        });
    }

    let mut out = io::stdout().lock();
    while !stop.is_stop_requested() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        match estimates.recv_timeout(Duration::from_millis(100)) {
            Ok(estimate) => {
                let reading = Reading::new(estimate, tuning);
                if args.json {
                    writeln!(out, "{}", serde_json::to_string(&reading)?)?;
                } else {
                    writeln!(out, "{reading}")?;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    tuner.stop()?;
    info!("Tuner stopped");
    Ok(())
}
