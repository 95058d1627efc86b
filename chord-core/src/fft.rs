//! # Spectral Analysis Module
//!
//! Turns a snapshot of recent PCM samples into an amplitude spectrum.
//!
//! ## Steps
//! - Hann windowing (RMS-normalised) to reduce spectral leakage
//! - Forward FFT using RustFFT, planned once per window size
//! - Magnitude of each bin below Nyquist

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;

use crate::error::{AnalysisError, Result};

/// Scale of the normalised Hann window. Gives the window an RMS of 1.
const HANN_NORM: f32 = 0.8165;

/// Builds an RMS-normalised periodic Hann window of length `n`.
fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| HANN_NORM * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos()))
        .collect()
}

/// Windowed FFT analyzer for a fixed window length.
pub struct SpectralAnalyzer {
    window_size: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("window_size", &self.window_size)
            .finish()
    }
}

impl SpectralAnalyzer {
    /// Plans the FFT and precomputes the window.
    ///
    /// # Errors
    /// * `InvalidWindow` if `window_size` is not a power of two.
    pub fn new(window_size: usize) -> Result<Self> {
        if window_size < 8 || !window_size.is_power_of_two() {
            return Err(AnalysisError::InvalidWindow(window_size));
        }
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(window_size);
        Ok(Self {
            window_size,
            window: hann_window(window_size),
            fft,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Number of output bins (window / 2).
    pub fn bin_count(&self) -> usize {
        self.window_size / 2
    }

    /// Width of one spectrum bin in Hz.
    pub fn bin_width(&self, sample_rate: f32) -> f32 {
        sample_rate / self.window_size as f32
    }

    /// Computes the amplitude spectrum of the most recent `window_size` samples.
    ///
    /// Returns `window_size / 2` bins; bin `i` sits at `i * sample_rate / window_size` Hz.
    ///
    /// # Errors
    /// * `InsufficientData` if fewer than `window_size` samples were supplied.
    pub fn analyze(&self, samples: &[f32]) -> Result<Vec<f32>> {
        if samples.len() < self.window_size {
            return Err(AnalysisError::InsufficientData {
                needed: self.window_size,
                got: samples.len(),
            });
        }
        let frame = &samples[samples.len() - self.window_size..];

        let mut buffer: Vec<Complex<f32>> = frame
            .iter()
            .zip(self.window.iter())
            .map(|(&sample, &w)| Complex { re: sample * w, im: 0.0 })
            .collect();

        self.fft.process(&mut buffer);

        Ok(buffer
            .iter()
            .take(self.bin_count())
            .map(|c| c.norm_sqr().sqrt())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize, amp: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn rejects_non_power_of_two() {
        assert_eq!(SpectralAnalyzer::new(1000).unwrap_err(), AnalysisError::InvalidWindow(1000));
        assert!(SpectralAnalyzer::new(0).is_err());
    }

    #[test]
    fn short_buffer_is_insufficient_data() {
        let analyzer = SpectralAnalyzer::new(1024).unwrap();
        let err = analyzer.analyze(&[0.0; 512]).unwrap_err();
        assert_eq!(err, AnalysisError::InsufficientData { needed: 1024, got: 512 });
    }

    #[test]
    fn output_has_half_window_bins() {
        let analyzer = SpectralAnalyzer::new(1024).unwrap();
        let spectrum = analyzer.analyze(&[0.0; 2048]).unwrap();
        assert_eq!(spectrum.len(), 512);
        assert!(spectrum.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn bin_centred_sine_peaks_at_its_bin() {
        let sample_rate = 8192.0;
        let analyzer = SpectralAnalyzer::new(1024).unwrap();
        // 8 Hz per bin, so 400 Hz lands on bin 50.
        let spectrum = analyzer.analyze(&sine(400.0, sample_rate, 1024, 0.5)).unwrap();
        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 50);
        assert!((analyzer.bin_width(sample_rate) * peak as f32 - 400.0).abs() < 1e-3);
        // Amplitude scaling: A/2 * sum(window) = 0.25 * 0.8165 * 1024.
        assert!((spectrum[50] - 0.25 * HANN_NORM * 1024.0).abs() < 1.0);
    }

    #[test]
    fn uses_the_most_recent_window() {
        let analyzer = SpectralAnalyzer::new(256).unwrap();
        let mut samples = sine(1000.0, 8192.0, 256, 1.0);
        samples.extend(std::iter::repeat(0.0).take(256));
        let spectrum = analyzer.analyze(&samples).unwrap();
        assert!(spectrum.iter().all(|&m| m == 0.0));
    }
}
