// chord-core/src/lib.rs

//! The core logic for strum chord recognition.
//! This crate is responsible for onset detection, spectral analysis,
//! chroma extraction and chord template matching. It is completely headless
//! and contains no device or GUI code; audio arrives through the
//! [`engine::SampleSource`] trait and amplitude callbacks.

pub mod chroma;
pub mod config;
pub mod engine;
pub mod error;
pub mod fft;
pub mod matcher;
pub mod onset;
pub mod pipeline;
pub mod pitch;
pub mod replay;
pub mod ring;
pub mod templates;
pub mod tuning;

use serde::Serialize;

pub use config::EngineConfig;
pub use engine::{ChordEngine, EngineEvent, SampleSource};
pub use error::AnalysisError;
pub use templates::{ChordTemplate, TemplateBank};
pub use tuning::Tuning;

/// Energy per pitch class, C = 0 through B = 11.
pub type ChromaVector = [f32; 12];

/// Chord label shown before any strum has been analysed, or right after an onset.
pub const NO_CHORD: &str = "--";

/// Chord label shown when no template scored above the confidence floor.
pub const UNKNOWN_CHORD: &str = "?";

/// One scored template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub name: String,
    pub score: f32,
}

/// Represents the published outcome of one analysis cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    /// `"--"` (nothing yet), `"?"` (no confident match) or a chord name.
    pub chord: String,
    /// Score of the best candidate, in [0, 1] for real inputs.
    pub confidence: f32,
    /// The chroma vector the decision was made on.
    pub chroma: ChromaVector,
    /// Every template, best first.
    pub candidates: Vec<Candidate>,
    /// Session generation that produced this result.
    pub session: u64,
}

impl DetectionResult {
    /// The cleared state: no chord, zero confidence, zero chroma, no candidates.
    pub fn cleared(session: u64) -> Self {
        Self {
            chord: NO_CHORD.to_string(),
            confidence: 0.0,
            chroma: [0.0; 12],
            candidates: Vec::new(),
            session,
        }
    }

    /// True when a template was accepted by name.
    pub fn is_confident(&self) -> bool {
        self.chord != NO_CHORD && self.chord != UNKNOWN_CHORD
    }
}

impl Default for DetectionResult {
    fn default() -> Self {
        Self::cleared(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleared_result_is_not_confident() {
        let cleared = DetectionResult::cleared(4);
        assert_eq!(cleared.chord, NO_CHORD);
        assert_eq!(cleared.session, 4);
        assert!(!cleared.is_confident());
        assert_eq!(DetectionResult::default(), DetectionResult::cleared(0));
    }

    #[test]
    fn result_serializes_for_consumers() {
        let result = DetectionResult {
            chord: "Am".to_string(),
            confidence: 0.75,
            chroma: [0.0; 12],
            candidates: vec![Candidate {
                name: "Am".to_string(),
                score: 0.75,
            }],
            session: 2,
        };
        assert!(result.is_confident());
        let json: serde_json::Value = serde_json::to_value(&result).unwrap();
        assert_eq!(json["chord"], "Am");
        assert_eq!(json["candidates"][0]["score"], 0.75);
        assert_eq!(json["chroma"].as_array().map(|a| a.len()), Some(12));
    }
}
