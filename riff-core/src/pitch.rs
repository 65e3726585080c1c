//! # Pitch Classification
//!
//! Interprets a single frequency estimate musically: nearest chromatic
//! pitch, deviation in cents, and a best-effort fretboard position for
//! display. Pure and stateless; safe to call from any thread.

use crate::tuning::{self, MAX_FRET, Tuning};

/// A fretboard location. `string_index` 0 is the lowest string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FretPosition {
    pub string_index: u8,
    pub fret: u8,
}

impl FretPosition {
    /// String number as printed on a chart (1 = highest string).
    pub fn string_number(&self) -> u8 {
        tuning::STRING_COUNT as u8 - self.string_index
    }
}

/// The result of classifying one frequency sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifiedPitch {
    /// Nearest chromatic pitch.
    pub midi: i32,
    /// Signed deviation from `midi`'s exact frequency.
    pub cents: f64,
    /// Display-only guess; never used for judgment.
    pub position: Option<FretPosition>,
}

impl ClassifiedPitch {
    pub fn name(&self) -> String {
        tuning::midi_to_name(self.midi)
    }
}

/// Classifies `hz` against standard tuning.
pub fn classify(hz: f64) -> Option<ClassifiedPitch> {
    classify_with_tuning(hz, &Tuning::STANDARD)
}

/// Classifies `hz`, guessing the fretboard position against `tuning`.
///
/// Returns `None` for non-positive or non-finite input. Out-of-range but
/// positive frequencies are still classified; range filtering happens at
/// the capture side.
pub fn classify_with_tuning(hz: f64, tuning: &Tuning) -> Option<ClassifiedPitch> {
    if !hz.is_finite() || hz <= 0.0 {
        return None;
    }

    let midi = nearest_midi(tuning::hz_to_midi_float(hz));
    let cents = tuning::cents_between(hz, tuning::midi_to_hz(midi as f64));

    Some(ClassifiedPitch {
        midi,
        cents,
        position: fret_position(midi, tuning),
    })
}

/// Rounds half away from zero: an exact quarter tone goes to the upper
/// pitch and reads -50 cents.
fn nearest_midi(midi_float: f64) -> i32 {
    midi_float.round() as i32
}

/// First string, scanning from the lowest, on which `midi` is playable.
///
/// Every qualifying string reproduces the pitch exactly, so there is no
/// closeness to compare; the lowest string index wins.
pub fn fret_position(midi: i32, tuning: &Tuning) -> Option<FretPosition> {
    tuning
        .iter()
        .enumerate()
        .find_map(|(string_index, open)| {
            let fret = midi - open;
            (0..=MAX_FRET as i32).contains(&fret).then(|| FretPosition {
                string_index: string_index as u8,
                fret: fret as u8,
            })
        })
}
