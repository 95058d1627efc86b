//! # Instrument Tuning Module
//!
//! Identifies which four-string tuning the player is using. Chord templates
//! are root-relative, so the tuning never changes the template bank; it is
//! carried through the engine for open-string references and logging.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::pitch;

/// Supported four-string tunings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tuning {
    /// Re-entrant G4-C4-E4-A4.
    Standard,
    /// D3-G3-B3-E4, the top four strings of a guitar.
    #[default]
    Baritone,
}

/// One open string: its scientific name and note number.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenString {
    pub name: String,
    pub note: i64,
    pub frequency: f32,
}

/// Open-string note numbers per tuning, ordered from the 4th to the 1st string.
static OPEN_STRINGS: Lazy<BTreeMap<Tuning, Vec<OpenString>>> = Lazy::new(|| {
    let build = |notes: [i64; 4]| {
        notes
            .iter()
            .map(|&note| OpenString {
                name: pitch::note_name(note),
                note,
                frequency: pitch::note_to_frequency(note as f64) as f32,
            })
            .collect::<Vec<_>>()
    };
    let mut map = BTreeMap::new();
    map.insert(Tuning::Standard, build([67, 60, 64, 69]));
    map.insert(Tuning::Baritone, build([50, 55, 59, 64]));
    map
});

impl Tuning {
    pub fn display_name(&self) -> &'static str {
        match self {
            Tuning::Standard => "Standard (G-C-E-A)",
            Tuning::Baritone => "Baritone (D-G-B-E)",
        }
    }

    /// Open strings from the 4th string to the 1st.
    pub fn open_strings(&self) -> &'static [OpenString] {
        // Every variant is inserted when the table is built.
        OPEN_STRINGS.get(self).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Pitch-class names of the open strings, e.g. ["D", "G", "B", "E"].
    pub fn string_notes(&self) -> Vec<&'static str> {
        self.open_strings()
            .iter()
            .map(|s| pitch::pitch_class_name(pitch::pitch_class(s.note)))
            .collect()
    }
}
