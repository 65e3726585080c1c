//! # Play Session
//!
//! Everything that is live only while the player is in play mode: the
//! playback clock, the judgment engine and the most recent classification.
//! One [`PlaySession::tick`] per game-loop iteration does the whole
//! classify → clock → judge step.

use std::sync::Arc;
use std::time::Instant;

use log::info;

use crate::chart::{Chart, NoteEvent};
use crate::clock::PlaybackClock;
use crate::judge::{HIT_WINDOW_MS, JudgmentEngine, JudgmentStats, NoteState, TickResult};
use crate::pitch::{self, ClassifiedPitch};

/// How far ahead a snapshot lists upcoming notes.
pub const UPCOMING_HORIZON_MS: i64 = 3000;

/// Read-only view of a session for display.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaySnapshot {
    pub chart_time_ms: i64,
    pub stats: JudgmentStats,
    pub cursor: usize,
    pub note_count: usize,
    pub paused: bool,
    pub offset_ms: i64,
    pub live_pitch: Option<ClassifiedPitch>,
    pub finished: bool,
    /// Notes within [`UPCOMING_HORIZON_MS`] of the chart time, onset order.
    pub upcoming: Vec<NoteEvent>,
}

#[derive(Debug, Clone)]
pub struct PlaySession {
    chart: Arc<Chart>,
    clock: PlaybackClock,
    judge: JudgmentEngine,
    live_pitch: Option<ClassifiedPitch>,
    last_chart_time_ms: i64,
}

impl PlaySession {
    /// Starts a fresh session: chart time zero, clean statistics.
    pub fn start(chart: Arc<Chart>, now: Instant, offset_ms: i64) -> Self {
        let mut clock = PlaybackClock::new(now, offset_ms);
        clock.start(now);
        info!(
            "Play session started: '{}' ({} notes, offset {} ms)",
            chart.title,
            chart.notes.len(),
            offset_ms
        );
        Self {
            judge: JudgmentEngine::new(Arc::clone(&chart)),
            chart,
            clock,
            live_pitch: None,
            last_chart_time_ms: offset_ms,
        }
    }

    /// Runs one game-loop step with the latest published frequency.
    pub fn tick(&mut self, now: Instant, hz: Option<f32>) -> TickResult {
        self.live_pitch = hz.and_then(|hz| pitch::classify_with_tuning(hz as f64, &self.chart.tuning));
        self.last_chart_time_ms = self.clock.tick(now);
        self.judge.tick(self.last_chart_time_ms, self.live_pitch.as_ref())
    }

    pub fn toggle_pause(&mut self, now: Instant) -> bool {
        let running = self.clock.toggle(now);
        info!(
            "Playback {} at {} ms",
            if running { "resumed" } else { "paused" },
            self.clock.tick(now)
        );
        running
    }

    pub fn adjust_offset(&mut self, delta_ms: i64) {
        self.clock.adjust_offset(delta_ms);
        info!("Latency offset now {} ms", self.clock.offset_ms());
    }

    pub fn offset_ms(&self) -> i64 {
        self.clock.offset_ms()
    }

    pub fn is_paused(&self) -> bool {
        !self.clock.is_running()
    }

    pub fn is_finished(&self) -> bool {
        self.judge.is_finished()
    }

    pub fn stats(&self) -> JudgmentStats {
        self.judge.stats()
    }

    pub fn chart(&self) -> &Arc<Chart> {
        &self.chart
    }

    pub fn note_state(&self, index: usize) -> Option<NoteState> {
        self.judge.note_state(index)
    }

    /// Notes starting within `horizon_ms` after the last ticked chart time,
    /// including those still inside their hit window.
    pub fn upcoming_notes(&self, horizon_ms: i64) -> &[NoteEvent] {
        let from = self.last_chart_time_ms.saturating_sub(HIT_WINDOW_MS);
        let to = self.last_chart_time_ms.saturating_add(horizon_ms);
        self.chart.notes_between(from, to)
    }

    pub fn snapshot(&self) -> PlaySnapshot {
        PlaySnapshot {
            chart_time_ms: self.last_chart_time_ms,
            stats: self.judge.stats(),
            cursor: self.judge.cursor(),
            note_count: self.chart.notes.len(),
            paused: self.is_paused(),
            offset_ms: self.clock.offset_ms(),
            live_pitch: self.live_pitch,
            finished: self.judge.is_finished(),
            upcoming: self.upcoming_notes(UPCOMING_HORIZON_MS).to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::midi_to_hz;
    use std::time::Duration;

    fn chart() -> Arc<Chart> {
        Arc::new(Chart {
            notes: vec![
                NoteEvent::new(0, 6, 24, 100),
                NoteEvent::new(1000, 6, 0, 100),
                NoteEvent::new(3000, 5, 0, 100),
            ],
            ..Chart::default()
        })
    }

    fn hz(midi: i32) -> Option<f32> {
        Some(midi_to_hz(midi as f64) as f32)
    }

    #[test]
    fn classify_clock_and_judge_in_one_step() {
        let t0 = Instant::now();
        let mut session = PlaySession::start(chart(), t0, 0);

        let result = session.tick(t0, hz(64));
        assert_eq!(result.hits(), 1);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.stats.hits, 1);
        assert_eq!(snapshot.cursor, 1);
        assert_eq!(snapshot.live_pitch.map(|p| p.midi), Some(64));
    }

    #[test]
    fn silence_means_no_live_pitch() {
        let t0 = Instant::now();
        let mut session = PlaySession::start(chart(), t0, 0);
        session.tick(t0 + Duration::from_millis(1500), None);
        let snapshot = session.snapshot();
        assert!(snapshot.live_pitch.is_none());
        assert_eq!(snapshot.stats.misses, 2);
        assert_eq!(snapshot.chart_time_ms, 1500);
    }

    #[test]
    fn pausing_freezes_judgment() {
        let t0 = Instant::now();
        let mut session = PlaySession::start(chart(), t0, 0);
        session.tick(t0 + Duration::from_millis(900), None);
        assert!(!session.toggle_pause(t0 + Duration::from_millis(900)));

        // A long pause would otherwise miss the note at 1000 ms.
        let result = session.tick(t0 + Duration::from_secs(60), hz(40));
        assert_eq!(result.hits(), 1);
        assert_eq!(session.snapshot().chart_time_ms, 900);
        assert!(session.is_paused());
    }

    #[test]
    fn offset_moves_the_judged_time() {
        let t0 = Instant::now();
        let mut session = PlaySession::start(chart(), t0, 0);
        session.adjust_offset(-500);
        // Wall 1400 ms is chart 900 ms: the note at 1000 ms is still open.
        let result = session.tick(t0 + Duration::from_millis(1400), hz(40));
        assert_eq!(result.misses(), 1);
        assert_eq!(result.hits(), 1);
        assert_eq!(session.offset_ms(), -500);
    }

    #[test]
    fn upcoming_notes_follow_the_clock() {
        let t0 = Instant::now();
        let mut session = PlaySession::start(chart(), t0, 0);
        session.tick(t0 + Duration::from_millis(950), None);
        let upcoming = session.upcoming_notes(2000);
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].start_ms, 1000);
        assert_eq!(session.upcoming_notes(3000).len(), 2);
    }

    #[test]
    fn snapshot_lists_upcoming_notes() {
        let t0 = Instant::now();
        let mut session = PlaySession::start(chart(), t0, 0);
        session.tick(t0 + Duration::from_millis(100), None);
        let starts: Vec<i64> = session.snapshot().upcoming.iter().map(|n| n.start_ms).collect();
        assert_eq!(starts, vec![0, 1000, 3000]);

        session.tick(t0 + Duration::from_millis(500), None);
        let starts: Vec<i64> = session.snapshot().upcoming.iter().map(|n| n.start_ms).collect();
        assert_eq!(starts, vec![1000, 3000]);
    }

    #[test]
    fn extreme_offsets_never_panic() {
        let t0 = Instant::now();
        let mut session = PlaySession::start(chart(), t0, 0);
        session.adjust_offset(i64::MIN);
        assert!(session.tick(t0, hz(64)).is_empty());
        assert!(session.snapshot().upcoming.is_empty());

        session.adjust_offset(i64::MAX);
        session.adjust_offset(i64::MAX);
        let result = session.tick(t0 + Duration::from_millis(10), hz(64));
        assert_eq!(result.misses(), 3);
        assert!(session.snapshot().upcoming.is_empty());
    }

    #[test]
    fn finished_after_last_note() {
        let t0 = Instant::now();
        let mut session = PlaySession::start(chart(), t0, 0);
        session.tick(t0 + Duration::from_secs(10), None);
        assert!(session.is_finished());
        assert!(session.snapshot().finished);
        assert_eq!(session.note_state(2), Some(NoteState::Missed));
    }
}
