//! Integration tests for a whole play session
//!
//! Charts are parsed from JSON text, frequencies travel through the capture
//! cell, and judgment is read back through snapshots.

use std::sync::Arc;
use std::time::{Duration, Instant};

use riff_core::capture::analyze_frame;
use riff_core::tuning::midi_to_hz;
use riff_core::{
    AnalysisConfig, Chart, FrequencyCell, FrequencyRange, HIT_WINDOW_MS, MenuItem, Mode, ModeContext,
    ModeEvent, PlaySession, parse_flat, parse_measures,
};

const SAMPLE_RATE: u32 = 44_100;

fn sine(freq: f64) -> Vec<f32> {
    (0..2048)
        .map(|i| (0.4 * (2.0 * std::f64::consts::PI * freq * i as f64 / SAMPLE_RATE as f64).sin()) as f32)
        .collect()
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn test_full_song_through_the_capture_cell() {
    let chart = parse_flat(
        r#"{
  "meta": {"bpm": 120, "title": "Open Strings"},
  "notes": [
    {"t": 0,    "str": 6, "fret": 0},
    {"t": 500,  "str": 5, "fret": 0},
    {"t": 1000, "str": 4, "fret": 0},
    {"t": 1500, "str": 3, "fret": 0}
  ]
}"#,
    )
    .unwrap();
    let chart = Arc::new(chart);

    let cell = FrequencyCell::new();
    let config = AnalysisConfig {
        sample_rate: SAMPLE_RATE,
        amplitude_threshold: 0.01,
        range: FrequencyRange::default(),
    };

    let t0 = Instant::now();
    let mut session = PlaySession::start(Arc::clone(&chart), t0, 0);

    // Play the first three notes slightly late, skip the fourth.
    for (i, note) in chart.notes.iter().take(3).enumerate() {
        let target = chart.target_midi(note).unwrap();
        analyze_frame(&sine(midi_to_hz(target as f64)), &config, &cell);
        let at = t0 + ms(note.start_ms as u64 + 40);
        let result = session.tick(at, cell.latest());
        assert_eq!(result.hits(), 1, "note {} should be hit", i);
    }

    analyze_frame(&vec![0.0; 2048], &config, &cell);
    assert_eq!(cell.latest(), None);
    session.tick(t0 + ms(3000), cell.latest());

    let snapshot = session.snapshot();
    assert_eq!(snapshot.stats.hits, 3);
    assert_eq!(snapshot.stats.misses, 1);
    assert_eq!(snapshot.stats.combo, 0);
    assert_eq!(snapshot.stats.max_combo, 3);
    assert_eq!(snapshot.stats.accuracy, 75.0);
    assert!(snapshot.finished);
}

#[test]
fn test_measure_chart_hit_and_miss() {
    let chart = parse_measures(
        r#"{
  "meta": {"bpm": 120, "title": "Two", "tuning": [40,45,50,55,59,64]},
  "measures": [
    {"notes": [{"beat": 0.0, "string": 6, "fret": 24, "sustain": 0.2}]},
    {"notes": [{"beat": 0.0, "string": 1, "fret": 3, "sustain": 1.0}]}
  ]
}"#,
    )
    .unwrap();
    assert_eq!(chart.notes[1].start_ms, 2000);

    let t0 = Instant::now();
    let mut session = PlaySession::start(Arc::new(chart), t0, 0);

    let e4 = Some(midi_to_hz(64.0) as f32);
    assert_eq!(session.tick(t0, e4).hits(), 1);

    // Wrong pitch throughout the second note's window.
    for step in 0..20 {
        session.tick(t0 + ms(1880 + step * 16), e4);
    }
    session.tick(t0 + ms(2000 + HIT_WINDOW_MS as u64 + 1), e4);

    let stats = session.stats();
    assert_eq!((stats.hits, stats.misses, stats.combo), (1, 1, 0));
    assert_eq!(stats.accuracy, 50.0);
}

#[test]
fn test_latency_offset_rescues_a_late_player() {
    let chart = Arc::new(parse_flat(r#"{"notes": [{"t": 1000, "str": 1, "fret": 0}]}"#).unwrap());
    let e4 = Some(midi_to_hz(64.0) as f32);

    // Without compensation the detection arrives 200 ms after the onset.
    let t0 = Instant::now();
    let mut late = PlaySession::start(Arc::clone(&chart), t0, 0);
    late.tick(t0 + ms(1200), e4);
    assert_eq!(late.stats().misses, 1);

    let mut compensated = PlaySession::start(chart, t0, 0);
    for _ in 0..40 {
        compensated.adjust_offset(-5);
    }
    compensated.tick(t0 + ms(1200), e4);
    assert_eq!(compensated.stats().hits, 1);
}

#[test]
fn test_empty_chart_session_stays_quiet() {
    let t0 = Instant::now();
    let mut session = PlaySession::start(Arc::new(Chart::empty()), t0, 0);
    for step in 0..100 {
        let result = session.tick(t0 + ms(step * 16), Some(440.0));
        assert!(result.is_empty());
    }
    let snapshot = session.snapshot();
    assert!(snapshot.finished);
    assert_eq!(snapshot.stats.accuracy, 0.0);
    assert_eq!(snapshot.live_pitch.map(|p| p.midi), Some(69));
}

#[test]
fn test_mode_machine_drives_play() {
    let t0 = Instant::now();
    let mut ctx = ModeContext {
        chart: Arc::new(parse_flat(r#"{"notes": [{"t": 300, "str": 2, "fret": 1}]}"#).unwrap()),
        now: t0,
        offset_ms: 0,
        offset_step_ms: 5,
    };

    let mut mode = Mode::default();
    for _ in 0..4 {
        mode = mode.on_event(ModeEvent::Down, &ctx);
    }
    mode = mode.on_event(ModeEvent::Confirm, &ctx);
    assert!(matches!(mode, Mode::Play(_)));

    ctx.now = t0 + ms(100);
    mode = mode.on_event(ModeEvent::TogglePause, &ctx);
    ctx.now = t0 + ms(5100);
    mode = mode.on_event(ModeEvent::TogglePause, &ctx);

    // Five seconds of pause later, chart time is only 300 ms.
    let c4 = Some(midi_to_hz(60.0) as f32);
    let session = mode.play_session_mut().unwrap();
    assert_eq!(session.tick(t0 + ms(5300), c4).hits(), 1);

    mode = mode.on_event(ModeEvent::Back, &ctx);
    assert!(mode.play_session().is_none());
    assert!(matches!(Mode::enter(MenuItem::Play, &ctx), Mode::Play(_)));
}

#[test]
fn test_bundled_example_chart_loads() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../charts/example.json");
    let chart = riff_core::load_chart(&path).unwrap();
    assert_eq!(chart.title, "Open String Warmup");
    assert_eq!(chart.notes.len(), 10);
    assert!(chart.notes.windows(2).all(|w| w[0].start_ms <= w[1].start_ms));
    assert_eq!(chart.notes[7].slide_to_fret, Some(7));
}

#[test]
fn test_missing_chart_file_is_an_io_error() {
    let path = std::env::temp_dir().join("riff-no-such-chart.mss");
    let err = riff_core::load_chart(&path).unwrap_err();
    assert!(matches!(err, riff_core::ChartError::Io { .. }));
}
