//! Synthetic guitar input.
//!
//! Plays the chart notes as sine tones at the chart time the game loop
//! publishes, so the whole capture pipeline runs without an audio device.

use std::f64::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, info, warn};
use riff_core::Chart;
use riff_core::tuning::midi_to_hz;

pub const SIMULATED_SAMPLE_RATE: u32 = 44_100;

/// Notes shorter than this still sound long enough to be detected.
const MIN_SOUNDING_MS: i64 = 200;

const AMPLITUDE: f64 = 0.4;

/// Chart time shared by the game loop. `NOT_PLAYING` means silence.
#[derive(Debug)]
pub struct SharedChartTime(AtomicI64);

impl SharedChartTime {
    pub const NOT_PLAYING: i64 = i64::MIN;

    pub fn new() -> Self {
        Self(AtomicI64::new(Self::NOT_PLAYING))
    }

    pub fn set(&self, chart_time_ms: Option<i64>) {
        self.0
            .store(chart_time_ms.unwrap_or(Self::NOT_PLAYING), Ordering::Relaxed);
    }

    pub fn get(&self) -> Option<i64> {
        let t = self.0.load(Ordering::Relaxed);
        (t != Self::NOT_PLAYING).then_some(t)
    }
}

impl Default for SharedChartTime {
    fn default() -> Self {
        Self::new()
    }
}

/// Frequency the simulated player is sounding at `chart_time_ms`.
pub fn sounding_frequency(chart: &Chart, chart_time_ms: i64) -> Option<f64> {
    chart
        .notes
        .iter()
        .rev()
        .find(|note| {
            note.start_ms <= chart_time_ms
                && chart_time_ms < note.start_ms.saturating_add(note.duration_ms.max(MIN_SOUNDING_MS))
        })
        .and_then(|note| chart.target_midi(note))
        .map(|midi| midi_to_hz(midi as f64))
}

/// Phase-continuous sine generator.
#[derive(Debug, Default)]
struct ToneGenerator {
    sample_counter: u64,
}

impl ToneGenerator {
    fn frame(&mut self, freq: Option<f64>, frame_size: usize) -> Vec<f32> {
        let start = self.sample_counter;
        self.sample_counter += frame_size as u64;
        match freq {
            Some(freq) => (0..frame_size as u64)
                .map(|i| {
                    let t = (start + i) as f64 / SIMULATED_SAMPLE_RATE as f64;
                    (AMPLITUDE * (2.0 * PI * freq * t).sin()) as f32
                })
                .collect(),
            None => vec![0.0; frame_size],
        }
    }
}

#[derive(Debug)]
pub struct Simulator {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Simulator {
    /// Starts producing one frame per frame period into `frames`.
    pub fn spawn(
        chart: Arc<Chart>,
        chart_time: Arc<SharedChartTime>,
        frames: Sender<Vec<f32>>,
        frame_size: usize,
    ) -> Result<Self> {
        if frame_size == 0 {
            return Err(anyhow!("Frame size must be positive"));
        }
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let period = Duration::from_secs_f64(frame_size as f64 / SIMULATED_SAMPLE_RATE as f64);
        let thread_handle = thread::Builder::new()
            .name("riff-simulator".to_string())
            .spawn(move || run(&chart, &chart_time, &frames, &shutdown_rx, frame_size, period))?;

        info!("Simulated input at {} Hz, {} samples per frame", SIMULATED_SAMPLE_RATE, frame_size);
        Ok(Self {
            shutdown_tx,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.shutdown_tx.try_send(());
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("Simulator thread panicked");
            }
        }
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    chart: &Chart,
    chart_time: &SharedChartTime,
    frames: &Sender<Vec<f32>>,
    shutdown_rx: &Receiver<()>,
    frame_size: usize,
    period: Duration,
) {
    let mut generator = ToneGenerator::default();
    let ticker = crossbeam_channel::tick(period);
    loop {
        crossbeam_channel::select! {
            recv(ticker) -> _ => {
                let freq = chart_time.get().and_then(|t| sounding_frequency(chart, t));
                if let Err(TrySendError::Disconnected(_)) = frames.try_send(generator.frame(freq, frame_size)) {
                    debug!("Frame receiver gone, simulator exiting");
                    break;
                }
            },
            recv(shutdown_rx) -> _ => break,
        }
    }
}
