//! # Audio Capture Module
//!
//! Opens the default input device with CPAL and feeds the engine from the
//! audio callback: every block is downmixed to mono, appended to the sample
//! ring and reduced to one RMS amplitude value for onset detection.

use anyhow::{Result, anyhow};
use chord_core::ChordEngine;
use chord_core::ring::{self, SampleRing};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfigRange};
use log::{error, info};
use std::sync::Arc;

/// Preferred capture rate. Devices that cannot do it use their closest rate.
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// A chosen input device and stream format, not yet running.
pub struct InputSetup {
    device: cpal::Device,
    config: cpal::StreamConfig,
}

impl InputSetup {
    /// Selects the default input device and the f32 format closest to
    /// [`TARGET_SAMPLE_RATE`], preferring mono.
    pub fn open_default() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;
        info!("Using audio input device: {}", device.name()?);

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let supported = find_supported_config(configs, TARGET_SAMPLE_RATE)
            .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;
        let rate = TARGET_SAMPLE_RATE
            .clamp(supported.min_sample_rate().0, supported.max_sample_rate().0);
        let config: cpal::StreamConfig = supported.with_sample_rate(cpal::SampleRate(rate)).into();

        info!("Selected sample rate: {} Hz, {} channel(s)", rate, config.channels);
        Ok(Self { device, config })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Starts the stream. The returned handle must be kept alive.
    pub fn start(self, ring: Arc<SampleRing>, engine: Arc<ChordEngine>) -> Result<cpal::Stream> {
        let channels = self.config.channels.max(1) as usize;
        let mut mono = Vec::new();

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                downmix(data, channels, &mut mono);
                ring.push(&mono);
                engine.on_amplitude(ring::rms(&mono));
            },
            |err| error!("An error occurred on the audio stream: {}", err),
            None,
        )?;
        stream.play()?;
        Ok(stream)
    }
}

/// Averages interleaved frames into `out`, reusing its allocation.
fn downmix(data: &[f32], channels: usize, out: &mut Vec<f32>) {
    out.clear();
    if channels == 1 {
        out.extend_from_slice(data);
    } else {
        out.extend(
            data.chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    }
}

/// Picks the f32 configuration with the fewest channels whose rate range
/// comes closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .min_by_key(|c| {
            let rate_miss = if target_rate < c.min_sample_rate().0 {
                c.min_sample_rate().0 - target_rate
            } else {
                target_rate.saturating_sub(c.max_sample_rate().0)
            };
            (rate_miss, c.channels())
        })
}
