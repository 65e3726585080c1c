//! # Judgment Engine
//!
//! Walks a chart note by note, once per game-loop tick. Every note starts
//! `Pending` and ends either `Hit` (the live pitch matched inside the hit
//! window) or `Missed` (the window elapsed without a match). The cursor only
//! moves forward, so a resolved note is never looked at again.

use std::sync::Arc;

use log::debug;

use crate::chart::Chart;
use crate::pitch::ClassifiedPitch;

/// Symmetric tolerance around a note onset, in milliseconds.
pub const HIT_WINDOW_MS: i64 = 120;

/// Per-note judgment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteState {
    Pending,
    /// Matched; `offset_ms` is chart time minus onset (negative = early).
    Hit { offset_ms: i64 },
    Missed,
}

/// A note that changed state during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub note_index: usize,
    pub state: NoteState,
}

/// Everything a single tick resolved, in cursor order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickResult {
    pub resolved: Vec<Resolution>,
}

impl TickResult {
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.resolved
            .iter()
            .filter(|r| matches!(r.state, NoteState::Hit { .. }))
            .count()
    }

    pub fn misses(&self) -> usize {
        self.resolved
            .iter()
            .filter(|r| r.state == NoteState::Missed)
            .count()
    }
}

/// Aggregate statistics, read by the display side as a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JudgmentStats {
    pub hits: u32,
    pub misses: u32,
    pub combo: u32,
    pub max_combo: u32,
    /// Percentage of resolved notes that were hit, 0 when nothing resolved.
    pub accuracy: f64,
}

impl JudgmentStats {
    fn record_hit(&mut self) {
        self.hits += 1;
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
        self.recompute_accuracy();
    }

    fn record_miss(&mut self) {
        self.misses += 1;
        self.combo = 0;
        self.recompute_accuracy();
    }

    /// Always derived from the counters, never accumulated.
    fn recompute_accuracy(&mut self) {
        let resolved = self.hits + self.misses;
        self.accuracy = if resolved == 0 {
            0.0
        } else {
            100.0 * self.hits as f64 / resolved as f64
        };
    }
}

#[derive(Debug, Clone)]
pub struct JudgmentEngine {
    chart: Arc<Chart>,
    cursor: usize,
    states: Vec<NoteState>,
    stats: JudgmentStats,
}

impl JudgmentEngine {
    /// A fresh engine: cursor at the first note, all statistics zero.
    pub fn new(chart: Arc<Chart>) -> Self {
        let states = vec![NoteState::Pending; chart.notes.len()];
        Self {
            chart,
            cursor: 0,
            states,
            stats: JudgmentStats::default(),
        }
    }

    /// Advances judgment to `chart_time_ms` given the current live pitch.
    ///
    /// First every note whose window closed before `chart_time_ms` is
    /// missed, then the note at the cursor is hit if its window contains
    /// `chart_time_ms` and `live` carries its exact MIDI pitch. Cents are
    /// ignored. At most one note is hit per tick.
    pub fn tick(&mut self, chart_time_ms: i64, live: Option<&ClassifiedPitch>) -> TickResult {
        let mut result = TickResult::default();

        while let Some(note) = self.chart.notes.get(self.cursor) {
            if chart_time_ms <= note.start_ms.saturating_add(HIT_WINDOW_MS) {
                break;
            }
            debug!(
                "Missed note {} (string {}, fret {}) at {} ms",
                self.cursor, note.string, note.fret, note.start_ms
            );
            self.resolve(NoteState::Missed, &mut result);
        }

        let matched = match (self.chart.notes.get(self.cursor), live) {
            (Some(note), Some(live)) => {
                let offset_ms = chart_time_ms.saturating_sub(note.start_ms);
                let in_window = offset_ms.unsigned_abs() <= HIT_WINDOW_MS.unsigned_abs();
                (in_window && self.chart.target_midi(note) == Some(live.midi)).then(|| {
                    debug!(
                        "Hit note {} (midi {}) {:+} ms, {:+.1} cents",
                        self.cursor, live.midi, offset_ms, live.cents
                    );
                    offset_ms
                })
            }
            _ => None,
        };
        if let Some(offset_ms) = matched {
            self.resolve(NoteState::Hit { offset_ms }, &mut result);
        }

        result
    }

    fn resolve(&mut self, state: NoteState, result: &mut TickResult) {
        match state {
            NoteState::Hit { .. } => self.stats.record_hit(),
            NoteState::Missed => self.stats.record_miss(),
            NoteState::Pending => return,
        }
        self.states[self.cursor] = state;
        result.resolved.push(Resolution {
            note_index: self.cursor,
            state,
        });
        self.cursor += 1;
    }

    pub fn stats(&self) -> JudgmentStats {
        self.stats
    }

    /// Index of the earliest unresolved note; equals the note count when
    /// everything has been judged.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn note_state(&self, index: usize) -> Option<NoteState> {
        self.states.get(index).copied()
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.chart.notes.len()
    }
}
