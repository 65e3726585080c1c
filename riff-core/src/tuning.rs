//! # Musical Tuning Module
//!
//! Equal-temperament conversions between frequency, MIDI numbers, note names
//! and cents, plus the guitar string tuning carried by every chart.
//!
//! ## Features
//! - MIDI number ↔ frequency conversion (A4 = MIDI 69 = 440 Hz)
//! - Cent deviation calculations
//! - MIDI number to note name mapping ("E2", "C#4")
//! - Six-string tuning with string-number lookups

use serde::{Deserialize, Serialize};

/// Reference pitch for MIDI 69 (A4).
pub const A4_HZ: f64 = 440.0;

/// MIDI number of the reference pitch.
pub const A4_MIDI: i32 = 69;

/// Highest fret the fretboard model knows about.
pub const MAX_FRET: u8 = 24;

/// Number of strings on the instrument.
pub const STRING_COUNT: usize = 6;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Converts a (possibly fractional) MIDI number into its frequency in Hz.
pub fn midi_to_hz(midi: f64) -> f64 {
    A4_HZ * 2.0_f64.powf((midi - A4_MIDI as f64) / 12.0)
}

/// Converts a frequency in Hz into a continuous MIDI number.
///
/// The caller is responsible for passing a positive frequency; non-positive
/// input yields `-inf` or `NaN`.
pub fn hz_to_midi_float(hz: f64) -> f64 {
    A4_MIDI as f64 + 12.0 * (hz / A4_HZ).log2()
}

/// Calculates the deviation from a target frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn cents_between(freq: f64, target_freq: f64) -> f64 {
    1200.0 * (freq / target_freq).log2()
}

/// Returns the scientific pitch name for a MIDI number, e.g. `64 -> "E4"`.
pub fn midi_to_name(midi: i32) -> String {
    let name = NOTE_NAMES[midi.rem_euclid(12) as usize];
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", name, octave)
}

/// Open-string pitches of a six-string instrument.
///
/// Index 0 is the lowest string (string number 6), index 5 the highest
/// (string number 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tuning(pub [i32; STRING_COUNT]);

impl Tuning {
    /// E2 A2 D3 G3 B3 E4.
    pub const STANDARD: Tuning = Tuning([40, 45, 50, 55, 59, 64]);

    /// Open-string MIDI number for a string index (0 = lowest string).
    pub fn open_midi_at(&self, string_index: usize) -> Option<i32> {
        self.0.get(string_index).copied()
    }

    /// Open-string MIDI number for a string number (1 = highest string).
    pub fn open_midi(&self, string_number: u8) -> Option<i32> {
        let number = string_number as usize;
        if !(1..=STRING_COUNT).contains(&number) {
            return None;
        }
        self.open_midi_at(STRING_COUNT - number)
    }

    /// Iterates the open-string pitches from the lowest string upward.
    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.iter().copied()
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning::STANDARD
    }
}
