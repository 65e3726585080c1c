//! # Capture Handoff
//!
//! The producer side of the pipeline. Audio frames arrive over a channel, a
//! worker thread estimates one frequency per frame and publishes it into a
//! [`FrequencyCell`], and the game loop reads the cell once per tick.
//!
//! The cell holds exactly one value. The producer never waits for the
//! consumer; a newer estimate simply overwrites an unread older one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread::{self, JoinHandle};

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};

use crate::detect;

/// Bit pattern stored when there is no signal (`0.0_f32`).
const NO_SIGNAL: u32 = 0;

/// Single-producer, single-consumer slot for the latest frequency estimate.
#[derive(Debug, Default)]
pub struct FrequencyCell {
    bits: AtomicU32,
}

impl FrequencyCell {
    pub fn new() -> Self {
        Self {
            bits: AtomicU32::new(NO_SIGNAL),
        }
    }

    /// Overwrites the slot. `None`, zero, negative and non-finite values all
    /// mean "no signal".
    pub fn publish(&self, hz: Option<f32>) {
        let bits = match hz {
            Some(hz) if hz.is_finite() && hz > 0.0 => hz.to_bits(),
            _ => NO_SIGNAL,
        };
        self.bits.store(bits, Ordering::Release);
    }

    pub fn clear(&self) {
        self.publish(None);
    }

    /// The most recently published frequency, if any.
    pub fn latest(&self) -> Option<f32> {
        let hz = f32::from_bits(self.bits.load(Ordering::Acquire));
        (hz.is_finite() && hz > 0.0).then_some(hz)
    }
}

/// Plausible instrument range; estimates outside it are capture artifacts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyRange {
    pub min_hz: f32,
    pub max_hz: f32,
}

impl Default for FrequencyRange {
    fn default() -> Self {
        Self {
            min_hz: 20.0,
            max_hz: 2000.0,
        }
    }
}

impl FrequencyRange {
    /// Exclusive at both ends.
    pub fn accepts(&self, hz: f32) -> bool {
        hz > self.min_hz && hz < self.max_hz
    }

    pub fn filter(&self, hz: Option<f32>) -> Option<f32> {
        hz.filter(|&hz| self.accepts(hz))
    }
}

/// Parameters for turning frames into published estimates.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisConfig {
    pub sample_rate: u32,
    pub amplitude_threshold: f32,
    pub range: FrequencyRange,
}

/// Estimates, range-filters and publishes one frame.
pub fn analyze_frame(frame: &[f32], config: &AnalysisConfig, cell: &FrequencyCell) -> Option<f32> {
    let estimate = detect::estimate_frequency(frame, config.sample_rate, config.amplitude_threshold);
    let hz = config.range.filter(estimate);
    cell.publish(hz);
    hz
}

/// Worker thread that analyses incoming frames and publishes estimates.
///
/// Stops when [`stop`](Self::stop) is called or when every frame sender has
/// been dropped.
#[derive(Debug)]
pub struct AnalysisWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl AnalysisWorker {
    pub fn spawn(frames: Receiver<Vec<f32>>, config: AnalysisConfig, cell: Arc<FrequencyCell>) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let thread_handle = thread::Builder::new()
            .name("riff-analysis".to_string())
            .spawn(move || run_analysis(frames, shutdown_rx, config, &cell))?;

        info!(
            "Analysis worker started at {} Hz ({:.0}-{:.0} Hz accepted)",
            config.sample_rate, config.range.min_hz, config.range.max_hz
        );
        Ok(Self {
            shutdown_tx,
            thread_handle: Some(thread_handle),
        })
    }

    /// Signals the worker and waits for it to exit.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let _ = self.shutdown_tx.try_send(());
        if let Some(handle) = self.thread_handle.take() {
            handle
                .join()
                .map_err(|_| anyhow!("analysis worker panicked"))?;
            info!("Analysis worker stopped");
        }
        Ok(())
    }
}

impl Drop for AnalysisWorker {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("{}", e);
        }
    }
}

fn run_analysis(
    frames: Receiver<Vec<f32>>,
    shutdown_rx: Receiver<()>,
    config: AnalysisConfig,
    cell: &FrequencyCell,
) {
    loop {
        crossbeam_channel::select! {
            recv(frames) -> msg => match msg {
                Ok(frame) => {
                    let hz = analyze_frame(&frame, &config, cell);
                    debug!("frame of {} samples -> {:?}", frame.len(), hz);
                }
                Err(_) => {
                    debug!("Frame channel closed");
                    break;
                }
            },
            recv(shutdown_rx) -> _ => {
                debug!("Analysis worker received shutdown signal");
                break;
            },
        }
    }
    cell.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    const SAMPLE_RATE: u32 = 44_100;

    fn sine(freq: f32) -> Vec<f32> {
        (0..2048)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    fn config() -> AnalysisConfig {
        AnalysisConfig {
            sample_rate: SAMPLE_RATE,
            amplitude_threshold: 0.01,
            range: FrequencyRange::default(),
        }
    }

    #[test]
    fn cell_starts_empty_and_keeps_the_last_write() {
        let cell = FrequencyCell::new();
        assert_eq!(cell.latest(), None);
        cell.publish(Some(110.0));
        cell.publish(Some(220.0));
        assert_eq!(cell.latest(), Some(220.0));
        cell.clear();
        assert_eq!(cell.latest(), None);
    }

    #[test]
    fn cell_never_stores_a_fake_pitch() {
        let cell = FrequencyCell::new();
        for bad in [0.0, -3.0, f32::NAN, f32::INFINITY] {
            cell.publish(Some(bad));
            assert_eq!(cell.latest(), None);
        }
    }

    #[test]
    fn range_is_exclusive() {
        let range = FrequencyRange::default();
        assert!(!range.accepts(20.0));
        assert!(range.accepts(20.5));
        assert!(range.accepts(1999.0));
        assert!(!range.accepts(2000.0));
        assert_eq!(range.filter(Some(5000.0)), None);
        assert_eq!(range.filter(None), None);
    }

    #[test]
    fn analyze_frame_publishes_and_clears() {
        let cell = FrequencyCell::new();
        let hz = analyze_frame(&sine(220.0), &config(), &cell).unwrap();
        assert!((hz - 220.0).abs() < 3.0, "{}", hz);
        assert_eq!(cell.latest(), Some(hz));

        assert_eq!(analyze_frame(&vec![0.0; 2048], &config(), &cell), None);
        assert_eq!(cell.latest(), None);
    }

    #[test]
    fn worker_publishes_until_the_channel_closes() {
        let cell = Arc::new(FrequencyCell::new());
        let (tx, rx) = crossbeam_channel::bounded(4);
        let worker = AnalysisWorker::spawn(rx, config(), Arc::clone(&cell)).unwrap();

        tx.send(sine(330.0)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while cell.latest().is_none() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        let hz = cell.latest().unwrap();
        assert!((hz - 330.0).abs() < 5.0, "{}", hz);

        drop(tx);
        worker.stop().unwrap();
        assert_eq!(cell.latest(), None);
    }

    #[test]
    fn worker_stops_on_request() {
        let cell = Arc::new(FrequencyCell::new());
        let (_tx, rx) = crossbeam_channel::bounded::<Vec<f32>>(1);
        let worker = AnalysisWorker::spawn(rx, config(), cell).unwrap();
        worker.stop().unwrap();
    }
}
