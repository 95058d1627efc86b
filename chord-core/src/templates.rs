//! # Chord Template Bank
//!
//! Generates a weighted 12-bin chroma template for every root and chord
//! quality. Templates are root-relative and independent of the instrument
//! tuning, so one bank serves every tuning.
//!
//! Each quality is a formula of chord-tone intervals plus "anti" intervals
//! whose presence argues against the chord. Chord tones get positive weights
//! (root strongest, then the perfect fifth) and anti intervals a penalty.

use serde::Serialize;

use crate::ChromaVector;
use crate::pitch::PITCH_CLASS_NAMES;

/// Weight of the first interval of a formula.
pub const ROOT_WEIGHT: f32 = 1.3;
/// Weight of a perfect fifth (7 semitones) when present.
pub const FIFTH_WEIGHT: f32 = 1.1;
/// Weight of any other chord tone.
pub const TONE_WEIGHT: f32 = 1.0;
/// Weight of an interval that must be absent for a clean match.
pub const PENALTY_WEIGHT: f32 = -0.5;

/// A chord quality: name suffix, chord-tone intervals and penalty intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordFormula {
    pub suffix: &'static str,
    pub intervals: &'static [usize],
    pub anti_intervals: &'static [usize],
}

const fn formula(
    suffix: &'static str,
    intervals: &'static [usize],
    anti_intervals: &'static [usize],
) -> ChordFormula {
    ChordFormula { suffix, intervals, anti_intervals }
}

/// Quality formulas in generation order. The order is also the tie-break order.
///
/// Extended chords drop the fifth (and sometimes the third) because a
/// four-string voicing cannot hold every tone.
pub const FORMULAS: [ChordFormula; 21] = [
    // Triads
    formula("", &[0, 4, 7], &[3, 5, 9]),
    formula("m", &[0, 3, 7], &[4, 9]),
    formula("dim", &[0, 3, 6], &[4, 7]),
    formula("aug", &[0, 4, 8], &[3, 7]),
    // Suspended
    formula("sus2", &[0, 2, 7], &[3, 4]),
    formula("sus4", &[0, 5, 7], &[3, 4]),
    // Sevenths
    formula("7", &[0, 4, 7, 10], &[11]),
    formula("maj7", &[0, 4, 7, 11], &[10]),
    formula("m7", &[0, 3, 7, 10], &[4, 11]),
    formula("dim7", &[0, 3, 6, 9], &[4, 7, 10]),
    formula("m7b5", &[0, 3, 6, 10], &[4, 7]),
    // Sixths and added tones
    formula("6", &[0, 4, 7, 9], &[10]),
    formula("m6", &[0, 3, 7, 9], &[4, 10]),
    formula("add9", &[0, 4, 7, 2], &[3, 10, 11]),
    // Extended, four-string voicings
    formula("9", &[0, 4, 10, 2], &[11]),
    formula("maj9", &[0, 4, 11, 2], &[10]),
    formula("m9", &[0, 3, 10, 2], &[4, 11]),
    formula("11", &[0, 10, 2, 5], &[4]),
    formula("m11", &[0, 3, 10, 5], &[4]),
    formula("13", &[0, 4, 10, 9], &[11]),
    formula("maj13", &[0, 4, 11, 9], &[10]),
];

/// A reference chroma pattern for one chord.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChordTemplate {
    /// Root name plus quality suffix, e.g. "C#m7".
    pub name: String,
    /// Pitch class of the root.
    pub root: usize,
    /// Quality suffix ("" for major).
    pub quality: &'static str,
    /// Weighted pattern: positive for chord tones, negative for penalties.
    pub chroma: ChromaVector,
    /// Chord-tone names in formula order.
    pub notes: Vec<String>,
}

impl ChordTemplate {
    /// Builds the template of `formula` rooted at pitch class `root`.
    pub fn build(root: usize, formula: &ChordFormula) -> Self {
        let root = root % 12;
        let mut chroma = [0.0_f32; 12];
        let mut notes = Vec::with_capacity(formula.intervals.len());

        for (position, &interval) in formula.intervals.iter().enumerate() {
            let note_index = (root + interval) % 12;
            let weight = if position == 0 {
                ROOT_WEIGHT
            } else if interval == 7 {
                FIFTH_WEIGHT
            } else {
                TONE_WEIGHT
            };
            chroma[note_index] = weight;
            notes.push(PITCH_CLASS_NAMES[note_index].to_string());
        }

        for &interval in formula.anti_intervals {
            chroma[(root + interval) % 12] = PENALTY_WEIGHT;
        }

        Self {
            name: format!("{}{}", PITCH_CLASS_NAMES[root], formula.suffix),
            root,
            quality: formula.suffix,
            chroma,
            notes,
        }
    }

    /// Scores an input chroma vector against this template.
    ///
    /// The dot product runs over all bins, so penalty weights pull the score
    /// down when excluded tones are present. The template's own magnitude
    /// only counts positive weights, which keeps the penalty strength
    /// independent of how many chord tones the formula has.
    pub fn similarity(&self, input: &ChromaVector) -> f32 {
        let mut dot = 0.0_f32;
        let mut norm_template = 0.0_f32;
        let mut norm_input = 0.0_f32;

        for (&t, &x) in self.chroma.iter().zip(input.iter()) {
            dot += t * x;
            if t > 0.0 {
                norm_template += t * t;
            }
            norm_input += x * x;
        }

        let denom = norm_template.sqrt() * norm_input.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }
}

/// Generates every template: all 12 roots, each with every formula.
///
/// Pure; calling it twice yields identical banks.
pub fn generate() -> Vec<ChordTemplate> {
    (0..12)
        .flat_map(|root| FORMULAS.iter().map(move |f| ChordTemplate::build(root, f)))
        .collect()
}

/// Owned store of generated templates.
#[derive(Debug, Clone)]
pub struct TemplateBank {
    templates: Vec<ChordTemplate>,
}

impl TemplateBank {
    /// Creates a bank holding the full generated template set.
    pub fn new() -> Self {
        Self { templates: generate() }
    }

    /// Creates a bank from an explicit template list.
    pub fn from_templates(templates: Vec<ChordTemplate>) -> Self {
        Self { templates }
    }

    /// Regenerates the template set in place and returns the new count.
    pub fn refresh(&mut self) -> usize {
        self.templates = generate();
        self.templates.len()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn templates(&self) -> &[ChordTemplate] {
        &self.templates
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChordTemplate> {
        self.templates.iter()
    }

    pub fn find(&self, name: &str) -> Option<&ChordTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }
}

impl Default for TemplateBank {
    fn default() -> Self {
        Self::new()
    }
}
