//! # Analysis Pipeline
//!
//! One analysis pass: samples -> spectrum -> chroma -> ranked templates.
//! Synchronous and bounded by the window size; it never touches shared state.

use crate::chroma::ChromaExtractor;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::fft::SpectralAnalyzer;
use crate::matcher;
use crate::templates::ChordTemplate;
use crate::{ChromaVector, DetectionResult};

/// Reusable analyzer for one window size. The FFT plan is built once.
#[derive(Debug)]
pub struct Analyzer {
    spectral: SpectralAnalyzer,
    chroma: ChromaExtractor,
    confidence_floor: f32,
}

impl Analyzer {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let spectral = SpectralAnalyzer::new(config.window_size)?;
        Ok(Self {
            spectral,
            chroma: ChromaExtractor::new(config.window_size),
            confidence_floor: config.confidence_floor,
        })
    }

    pub fn window_size(&self) -> usize {
        self.spectral.window_size()
    }

    /// Computes the chroma vector of the most recent window of `samples`.
    pub fn chroma(&self, samples: &[f32], sample_rate: f32) -> Result<ChromaVector> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(AnalysisError::InvalidSampleRate(sample_rate));
        }
        let spectrum = self.spectral.analyze(samples)?;
        Ok(self.chroma.extract(&spectrum, sample_rate))
    }

    /// Runs the whole pass and builds the published result.
    ///
    /// An empty template list is not an error here: it yields `"?"` with
    /// zero confidence, and the caller decides how loudly to report it.
    ///
    /// # Errors
    /// * `InvalidSampleRate` if `sample_rate` is not finite and positive
    /// * `InsufficientData` if `samples` is shorter than the window
    pub fn analyze(
        &self,
        samples: &[f32],
        sample_rate: f32,
        templates: &[ChordTemplate],
        session: u64,
    ) -> Result<DetectionResult> {
        let chroma = self.chroma(samples, sample_rate)?;
        Ok(self.classify(chroma, templates, session))
    }

    /// Scores an already extracted chroma vector.
    pub fn classify(
        &self,
        chroma: ChromaVector,
        templates: &[ChordTemplate],
        session: u64,
    ) -> DetectionResult {
        let candidates = matcher::rank(&chroma, templates);
        let decision = matcher::decide(&candidates, self.confidence_floor);
        DetectionResult {
            chord: decision.chord,
            confidence: decision.confidence,
            chroma,
            candidates,
            session,
        }
    }
}
