//! # chord-listen
//!
//! Command line front end for the strum chord engine.
//!
//! ## Modes
//! - **Live**: captures the default input device, feeds the engine from the
//!   audio callback and prints every detection as it is published.
//! - **Replay** (`--wav`): runs a recorded take through the same onset and
//!   analysis logic on a sample clock and prints the detections with their
//!   position in the take.

mod capture;
mod cli;
mod wav;

use anyhow::{Context, Result};
use chord_core::replay::{self, TimedDetection};
use chord_core::ring::SampleRing;
use chord_core::{ChordEngine, DetectionResult, EngineConfig, EngineEvent, TemplateBank};
use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use capture::InputSetup;
use cli::Cli;

const LOCAL_CONFIG: &str = "chord-listen.toml";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(tuning) = cli.tuning {
        config.tuning = tuning.into();
    }
    config.validate().context("Invalid engine config")?;

    if cli.list_chords {
        list_chords();
        return Ok(());
    }

    info!(
        "Tuning: {} ({})",
        config.tuning.display_name(),
        config.tuning.string_notes().join(" ")
    );

    match cli.wav.clone() {
        Some(path) => replay_file(&cli, &config, &path),
        None => listen(&cli, config),
    }
}

/// Loads `--config`, or `./chord-listen.toml` when present, or the defaults.
fn load_config(explicit: Option<&Path>) -> Result<EngineConfig> {
    let path = explicit.map(Path::to_path_buf).or_else(|| {
        let local = PathBuf::from(LOCAL_CONFIG);
        local.exists().then_some(local)
    });
    match path {
        Some(path) => {
            let config = EngineConfig::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn list_chords() {
    let bank = TemplateBank::new();
    for template in bank.iter() {
        println!("{:<8} {}", template.name, template.notes.join(" "));
    }
    println!("{} chords", bank.len());
}

fn replay_file(cli: &Cli, config: &EngineConfig, path: &Path) -> Result<()> {
    let (samples, sample_rate) = wav::load_wav(path)?;
    info!(
        "Replaying {} ({:.1} s at {} Hz)",
        path.display(),
        samples.len() as f64 / sample_rate.max(1) as f64,
        sample_rate
    );

    let bank = TemplateBank::new();
    let detections = replay::replay(&samples, sample_rate as f32, config, &bank, cli.block_size)
        .context("Replay failed")?;
    for TimedDetection {
        onset_seconds,
        result,
        ..
    } in &detections
    {
        report(cli, *onset_seconds, result)?;
    }
    info!("{} strum(s) analysed", detections.len());
    Ok(())
}

fn listen(cli: &Cli, config: EngineConfig) -> Result<()> {
    if let Some(seconds) = cli.duration {
        anyhow::ensure!(
            seconds.is_finite() && seconds > 0.0,
            "--duration must be a positive number of seconds"
        );
    }

    let input = InputSetup::open_default()?;
    let ring = Arc::new(SampleRing::new(config.ring_capacity, input.sample_rate() as f32));
    let engine = Arc::new(ChordEngine::new(config, ring.clone())?);
    let events = engine.subscribe();
    engine.start();

    let stream = input
        .start(ring, engine.clone())
        .context("Failed to start audio capture")?;
    info!("Listening. Strum a chord.");

    let started = Instant::now();
    let deadline = cli.duration.map(|s| started + Duration::from_secs_f64(s));
    loop {
        let event = match deadline {
            Some(deadline) => match events.recv_deadline(deadline) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Engine event channel closed");
                    break;
                }
            },
            None => match events.recv() {
                Ok(event) => event,
                Err(_) => break,
            },
        };

        match event {
            EngineEvent::Detection(result) => {
                report(cli, started.elapsed().as_secs_f64(), &result)?;
            }
            EngineEvent::Onset { trigger_id, .. } => debug!("Onset {}", trigger_id),
            EngineEvent::Cleared { session } => debug!("Session {} cleared", session),
        }
    }

    drop(stream);
    engine.stop();
    Ok(())
}

/// Prints one detection, as text or as a JSON line.
fn report(cli: &Cli, seconds: f64, result: &DetectionResult) -> Result<()> {
    let runners_up = result.candidates.iter().skip(1).take(cli.candidates);

    if cli.json {
        let line = serde_json::json!({
            "time": seconds,
            "chord": result.chord,
            "confidence": result.confidence,
            "chroma": result.chroma,
            "candidates": result.candidates.iter().take(cli.candidates + 1).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }

    let others = runners_up
        .map(|c| format!("{} {:.2}", c.name, c.score))
        .collect::<Vec<_>>()
        .join(", ");
    println!(
        "{:>8.2}s  {:<6} {:.2}  [{}]",
        seconds, result.chord, result.confidence, others
    );
    Ok(())
}
