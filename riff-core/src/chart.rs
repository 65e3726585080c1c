//! # Chart Model
//!
//! The in-memory chart: an onset-ordered list of notes plus tempo, title and
//! string tuning. Charts are immutable once validated and shared read-only
//! between the play session and whatever displays it.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tuning::{MAX_FRET, STRING_COUNT, Tuning};

/// Latest time any note may still sound: 24 hours of chart time.
pub const MAX_CHART_MS: i64 = 24 * 60 * 60 * 1000;

/// One expected note onset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Chart-relative onset in milliseconds.
    pub start_ms: i64,
    /// String number, 1 (highest) to 6 (lowest).
    pub string: u8,
    pub fret: u8,
    /// Sustain length in milliseconds. Display only.
    pub duration_ms: i64,
    /// Slide target fret. Display only.
    pub slide_to_fret: Option<u8>,
    /// Technique tags such as "bend" or "hammer". Display only.
    pub techniques: BTreeSet<String>,
}

impl NoteEvent {
    pub fn new(start_ms: i64, string: u8, fret: u8, duration_ms: i64) -> Self {
        Self {
            start_ms,
            string,
            fret,
            duration_ms,
            slide_to_fret: None,
            techniques: BTreeSet::new(),
        }
    }
}

/// A playable chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub notes: Vec<NoteEvent>,
    pub tempo_bpm: f64,
    pub title: String,
    pub tuning: Tuning,
}

impl Default for Chart {
    fn default() -> Self {
        Self {
            notes: Vec::new(),
            tempo_bpm: 120.0,
            title: "Example".to_string(),
            tuning: Tuning::STANDARD,
        }
    }
}

impl Chart {
    /// A valid chart with nothing to play, used when loading fails.
    pub fn empty() -> Self {
        Self::default()
    }

    /// MIDI pitch the player must produce for `note`.
    ///
    /// `None` when the string number lies outside 1..=6; validated charts
    /// never contain such notes.
    pub fn target_midi(&self, note: &NoteEvent) -> Option<i32> {
        self.tuning
            .open_midi(note.string)
            .map(|open| open + note.fret as i32)
    }

    /// Notes starting in `[from_ms, to_ms]`, in onset order.
    pub fn notes_between(&self, from_ms: i64, to_ms: i64) -> &[NoteEvent] {
        let start = self.notes.partition_point(|n| n.start_ms < from_ms);
        let end = self.notes.partition_point(|n| n.start_ms <= to_ms);
        &self.notes[start..end.max(start)]
    }

    /// Onset of the last note plus its sustain, or 0 for an empty chart.
    pub fn length_ms(&self) -> i64 {
        self.notes
            .iter()
            .map(|n| n.start_ms.saturating_add(n.duration_ms))
            .max()
            .unwrap_or(0)
    }
}

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Failed to read chart '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed chart JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tempo must be a positive number of BPM, got {0}")]
    InvalidTempo(f64),

    #[error("Note {index} starts at {start_ms} ms, before the previous note at {previous_ms} ms")]
    Unsorted {
        index: usize,
        start_ms: i64,
        previous_ms: i64,
    },

    #[error("Note {index} has negative timing (start {start_ms} ms, duration {duration_ms} ms)")]
    NegativeTime {
        index: usize,
        start_ms: i64,
        duration_ms: i64,
    },

    #[error("Note {index} ends past {max_ms} ms (start {start_ms} ms, duration {duration_ms} ms)", max_ms = MAX_CHART_MS)]
    TooLong {
        index: usize,
        start_ms: i64,
        duration_ms: i64,
    },

    #[error("Note {index} uses string {string}, expected 1..=6")]
    StringOutOfRange { index: usize, string: i64 },

    #[error("Note {index} uses fret {fret}, expected 0..=24")]
    FretOutOfRange { index: usize, fret: i64 },
}

/// Checks every chart invariant the judgment engine relies on.
///
/// Out-of-range strings and frets are rejected rather than clamped: a
/// clamped note would ask the player for a pitch the chart author never
/// wrote.
pub fn validate(chart: Chart) -> Result<Chart, ChartError> {
    if !chart.tempo_bpm.is_finite() || chart.tempo_bpm <= 0.0 {
        return Err(ChartError::InvalidTempo(chart.tempo_bpm));
    }

    let mut previous_ms = i64::MIN;
    for (index, note) in chart.notes.iter().enumerate() {
        if note.start_ms < 0 || note.duration_ms < 0 {
            return Err(ChartError::NegativeTime {
                index,
                start_ms: note.start_ms,
                duration_ms: note.duration_ms,
            });
        }
        if note.start_ms > MAX_CHART_MS || note.duration_ms > MAX_CHART_MS - note.start_ms {
            return Err(ChartError::TooLong {
                index,
                start_ms: note.start_ms,
                duration_ms: note.duration_ms,
            });
        }
        if note.start_ms < previous_ms {
            return Err(ChartError::Unsorted {
                index,
                start_ms: note.start_ms,
                previous_ms,
            });
        }
        previous_ms = note.start_ms;

        if !(1..=STRING_COUNT as u8).contains(&note.string) {
            return Err(ChartError::StringOutOfRange {
                index,
                string: note.string as i64,
            });
        }
        if note.fret > MAX_FRET {
            return Err(ChartError::FretOutOfRange {
                index,
                fret: note.fret as i64,
            });
        }
        if let Some(slide) = note.slide_to_fret {
            if slide > MAX_FRET {
                return Err(ChartError::FretOutOfRange {
                    index,
                    fret: slide as i64,
                });
            }
        }
    }

    Ok(chart)
}
