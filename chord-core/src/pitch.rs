//! # Pitch Math
//!
//! Conversions between frequency, fractional note numbers and pitch classes.
//! Note numbers follow the MIDI convention: A4 = 440 Hz = 69, C4 = 60.

/// Reference pitch for A4 in Hz.
pub const A4_FREQUENCY: f64 = 440.0;

/// Note number of A4.
pub const A4_NOTE: f64 = 69.0;

/// Pitch-class names, C = 0 through B = 11.
pub const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Converts a frequency to a continuous (fractional) note number.
///
/// `n = 12 * log2(f / 440) + 69`. Non-positive frequencies map to 0.
pub fn frequency_to_note(freq: f64) -> f64 {
    if freq <= 0.0 {
        return 0.0;
    }
    12.0 * (freq / A4_FREQUENCY).log2() + A4_NOTE
}

/// Converts a (possibly fractional) note number back to Hz.
pub fn note_to_frequency(note: f64) -> f64 {
    A4_FREQUENCY * 2.0_f64.powf((note - A4_NOTE) / 12.0)
}

/// Maps any integer note number, including negative ones, to its pitch class.
pub fn pitch_class(note: i64) -> usize {
    (((note % 12) + 12) % 12) as usize
}

/// Name of a pitch class; indices wrap modulo 12.
pub fn pitch_class_name(pc: usize) -> &'static str {
    PITCH_CLASS_NAMES[pc % 12]
}

/// Scientific pitch name of an integer note number, e.g. 60 -> "C4".
pub fn note_name(note: i64) -> String {
    let octave = note.div_euclid(12) - 1;
    format!("{}{}", pitch_class_name(pitch_class(note)), octave)
}
