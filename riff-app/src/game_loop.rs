//! The fixed-rate game loop.
//!
//! Operator events and a ticker are selected on one thread. Every tick
//! reads the latest published frequency once and advances whatever the
//! current mode needs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, select};
use log::{debug, info};
use riff_core::{Chart, FrequencyCell, MENU, MenuItem, Mode, ModeContext, ModeEvent, classify_with_tuning};

use crate::simulate::SharedChartTime;

const STATS_LOG_INTERVAL: Duration = Duration::from_secs(2);
const TUNER_LOG_INTERVAL: Duration = Duration::from_millis(500);

pub struct GameLoop {
    mode: Mode,
    chart: Arc<Chart>,
    cell: Arc<FrequencyCell>,
    chart_time: Arc<SharedChartTime>,
    offset_ms: i64,
    offset_step_ms: i64,
    last_report: Option<Instant>,
    finish_reported: bool,
}

impl GameLoop {
    pub fn new(
        chart: Arc<Chart>,
        cell: Arc<FrequencyCell>,
        chart_time: Arc<SharedChartTime>,
        offset_ms: i64,
        offset_step_ms: i64,
    ) -> Self {
        Self {
            mode: Mode::default(),
            chart,
            cell,
            chart_time,
            offset_ms,
            offset_step_ms,
            last_report: None,
            finish_reported: false,
        }
    }

    fn context(&self, now: Instant) -> ModeContext {
        ModeContext {
            chart: Arc::clone(&self.chart),
            now,
            offset_ms: self.offset_ms,
            offset_step_ms: self.offset_step_ms,
        }
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// The latency offset as last adjusted by the operator.
    pub fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    /// Jumps straight into play mode.
    pub fn start_playing(&mut self, now: Instant) {
        self.mode = Mode::enter(MenuItem::Play, &self.context(now));
        self.on_mode_entered();
    }

    pub fn handle_event(&mut self, event: ModeEvent, now: Instant) {
        let ctx = self.context(now);
        let was_playing = self.mode.play_session().is_some();
        let before = self.mode.name();
        let mode = std::mem::take(&mut self.mode);
        self.mode = mode.on_event(event, &ctx);

        if let Some(session) = self.mode.play_session() {
            self.offset_ms = session.offset_ms();
        }
        if before != self.mode.name() || (!was_playing && self.mode.play_session().is_some()) {
            self.on_mode_entered();
        } else if let Mode::Title { selected } = self.mode {
            log_menu(selected);
        }
    }

    fn on_mode_entered(&mut self) {
        self.last_report = None;
        self.finish_reported = false;
        match &self.mode {
            Mode::Title { selected } => log_menu(*selected),
            Mode::Play(_) => {
                // A stale estimate from before play must not judge the first note.
                self.cell.clear();
            }
            _ => {}
        }
        if self.mode.play_session().is_none() {
            self.chart_time.set(None);
        }
    }

    /// One game-loop iteration.
    pub fn step(&mut self, now: Instant) {
        let hz = self.cell.latest();
        let report_due = self
            .last_report
            .is_none_or(|last| now.duration_since(last) >= report_interval(&self.mode));

        match &mut self.mode {
            Mode::Play(session) => {
                session.tick(now, hz);
                let snapshot = session.snapshot();
                self.chart_time.set(Some(snapshot.chart_time_ms));

                if snapshot.finished && !self.finish_reported {
                    self.finish_reported = true;
                    info!(
                        "Song finished: {} hits, {} misses, max combo {}, accuracy {:.1}%",
                        snapshot.stats.hits, snapshot.stats.misses, snapshot.stats.max_combo, snapshot.stats.accuracy
                    );
                } else if report_due && !snapshot.finished {
                    self.last_report = Some(now);
                    let next = snapshot
                        .upcoming
                        .iter()
                        .find(|n| n.start_ms >= snapshot.chart_time_ms)
                        .map_or("-".to_string(), |n| {
                            format!("s{} f{} in {} ms", n.string, n.fret, n.start_ms.saturating_sub(snapshot.chart_time_ms))
                        });
                    info!(
                        "{:>7} ms{} | note {}/{} | hits {} misses {} combo {} | {:.1}% | offset {} ms | {} | next {}",
                        snapshot.chart_time_ms,
                        if snapshot.paused { " (paused)" } else { "" },
                        snapshot.cursor,
                        snapshot.note_count,
                        snapshot.stats.hits,
                        snapshot.stats.misses,
                        snapshot.stats.combo,
                        snapshot.stats.accuracy,
                        snapshot.offset_ms,
                        snapshot.live_pitch.map_or("-".to_string(), |p| p.name()),
                        next,
                    );
                }
            }
            Mode::Tuner if report_due => {
                self.last_report = Some(now);
                match hz.and_then(|hz| classify_with_tuning(hz as f64, &self.chart.tuning)) {
                    Some(pitch) => {
                        let position = pitch.position.map_or("no fret".to_string(), |p| {
                            format!("string {} fret {}", p.string_number(), p.fret)
                        });
                        info!("Tuner: {:.1} Hz {} {:+.0} cents ({})", hz.unwrap_or(0.0), pitch.name(), pitch.cents, position);
                    }
                    None => debug!("Tuner: no signal"),
                }
            }
            _ => {}
        }
    }

    /// Runs until the mode machine exits or the event channel closes.
    pub fn run(&mut self, events: Receiver<ModeEvent>, tick: Duration) {
        let ticker = crossbeam_channel::tick(tick);
        self.on_mode_entered();
        while !self.mode.is_exit() {
            select! {
                recv(ticker) -> msg => match msg {
                    Ok(now) => self.step(now),
                    Err(_) => break,
                },
                recv(events) -> msg => match msg {
                    Ok(event) => self.handle_event(event, Instant::now()),
                    Err(_) => break,
                },
            }
        }
        self.chart_time.set(None);
    }
}

fn report_interval(mode: &Mode) -> Duration {
    match mode {
        Mode::Tuner => TUNER_LOG_INTERVAL,
        _ => STATS_LOG_INTERVAL,
    }
}

fn log_menu(selected: usize) {
    let rows: Vec<String> = MENU
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let marker = if i == selected { ">" } else { " " };
            format!("{}{} {}", marker, i + 1, item.label())
        })
        .collect();
    info!("Menu: {}", rows.join("  "));
}
