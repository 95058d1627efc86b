//! # Offline Replay
//!
//! Runs a recorded take through the same onset and analysis logic as the
//! live engine, but on a sample clock instead of the wall clock, so the
//! output is deterministic. The signal is walked in callback-sized blocks;
//! each block contributes one RMS amplitude value, and a trigger is analysed
//! at the first block boundary at or after its latch deadline.

use log::debug;
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::DetectionResult;
use crate::config::EngineConfig;
use crate::error::{AnalysisError, Result};
use crate::onset::{OnsetDetector, Trigger};
use crate::pipeline::Analyzer;
use crate::ring;
use crate::templates::TemplateBank;

/// Default block length, similar to a live audio callback (~23 ms at 44.1 kHz).
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// One analysed strum from a replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedDetection {
    /// Time of the detected attack, in seconds from the start of the take.
    pub onset_seconds: f64,
    /// Time the snapshot was taken, in seconds from the start of the take.
    pub analysed_seconds: f64,
    pub result: DetectionResult,
}

/// Replays `samples` recorded at `sample_rate` and returns every strum result.
///
/// A trigger still waiting when the take ends is analysed on the final
/// samples. Snapshots shorter than the window are skipped.
///
/// # Arguments
/// * `samples` - The whole take, mono
/// * `sample_rate` - Rate of `samples` in Hz
/// * `config` - Same parameters the live engine would use
/// * `bank` - Templates to score against
/// * `block_size` - Samples per simulated audio callback (one amplitude value each)
///
/// # Returns
/// * `Ok(detections)` - One entry per analysed strum, in take order
/// * `Err(e)` - Invalid config or sample rate
pub fn replay(
    samples: &[f32],
    sample_rate: f32,
    config: &EngineConfig,
    bank: &TemplateBank,
    block_size: usize,
) -> Result<Vec<TimedDetection>> {
    config.validate()?;
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(AnalysisError::InvalidSampleRate(sample_rate));
    }
    let block_size = block_size.max(1);
    let analyzer = Analyzer::new(&config.analysis)?;
    let mut detector = OnsetDetector::new(&config.onset);

    let origin = Instant::now();
    let clock =
        |sample: usize| origin + Duration::from_secs_f64(sample as f64 / sample_rate as f64);
    let seconds = |at: Instant| at.duration_since(origin).as_secs_f64();

    let mut detections = Vec::new();
    let analyse = |trigger: Trigger, end: usize, detections: &mut Vec<TimedDetection>| {
        match analyzer.analyze(&samples[..end], sample_rate, bank.templates(), 0) {
            Ok(result) => detections.push(TimedDetection {
                onset_seconds: seconds(trigger.fired_at),
                analysed_seconds: end as f64 / sample_rate as f64,
                result,
            }),
            Err(e) => debug!("onset {} skipped: {}", trigger.id, e),
        }
    };

    let mut end = 0;
    while end < samples.len() {
        let start = end;
        end = (start + block_size).min(samples.len());
        let now = clock(end);

        if let Some(trigger) = detector.take_due(now) {
            analyse(trigger, end, &mut detections);
        }
        detector.observe(ring::rms(&samples[start..end]), now);
    }

    if let Some(trigger) = detector.cancel() {
        analyse(trigger, samples.len(), &mut detections);
    }

    Ok(detections)
}
