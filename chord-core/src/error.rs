//! Error types for the chord recognition pipeline.
//!
//! None of these are fatal to a running engine. The worker thread logs them
//! and goes back to waiting for the next strum.

use thiserror::Error;

/// Errors that can occur while configuring or running an analysis.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// The sample snapshot was shorter than the analysis window.
    /// This is the normal "not enough audio buffered yet" case.
    #[error("insufficient data: needed {needed} samples, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// The template bank holds no templates, so nothing can be scored.
    #[error("template bank is empty")]
    EmptyTemplateBank,

    /// Analysis window must be a non-zero power of two.
    #[error("invalid analysis window size: {0} (must be a power of two)")]
    InvalidWindow(usize),

    /// Sample rate must be finite and positive.
    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(f32),

    /// Configuration could not be read or failed validation.
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
