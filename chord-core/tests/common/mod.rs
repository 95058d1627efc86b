//! Synthetic signals shared by the integration tests.

#![allow(dead_code)]

use chord_core::SampleSource;
use std::f32::consts::PI;

pub const SAMPLE_RATE: f32 = 44_100.0;

pub const C_MAJOR: [f32; 3] = [261.63, 329.63, 392.0];
pub const G_MAJOR: [f32; 3] = [196.0, 246.94, 293.66];
pub const A_MINOR: [f32; 3] = [220.0, 261.63, 329.63];

/// A plucked chord: equal-amplitude sines with an exponential decay.
pub fn strum(freqs: &[f32], len: usize, amp: f32, decay_seconds: f32) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE;
            let envelope = amp * (-t / decay_seconds).exp();
            freqs.iter().map(|&f| envelope * (2.0 * PI * f * t).sin()).sum()
        })
        .collect()
}

/// Writes `signal` into `take` starting at `at_seconds`, truncated at `until_seconds`.
pub fn place(take: &mut [f32], signal: &[f32], at_seconds: f32, until_seconds: f32) {
    let start = (at_seconds * SAMPLE_RATE) as usize;
    let stop = ((until_seconds * SAMPLE_RATE) as usize).min(take.len());
    for (slot, &s) in take[start..stop].iter_mut().zip(signal) {
        *slot += s;
    }
}

/// Sample source that always returns the same buffer.
pub struct FixedSource {
    pub samples: Vec<f32>,
}

impl SampleSource for FixedSource {
    fn sample_rate(&self) -> f32 {
        SAMPLE_RATE
    }

    fn recent_samples(&self, count: usize) -> Vec<f32> {
        let start = self.samples.len().saturating_sub(count);
        self.samples[start..].to_vec()
    }
}
