// riff-app/src/main.rs

//! Terminal front end for the guitar practice trainer.
//!
//! Wires the capture source, the analysis worker and the game loop together
//! and reads operator commands from stdin.

mod game_loop;
mod input;
mod settings;
mod simulate;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use riff_core::{AnalysisWorker, Chart, FrequencyCell, load_chart};

use crate::game_loop::GameLoop;
use crate::settings::{DEFAULT_SETTINGS_PATH, Settings};
use crate::simulate::{SIMULATED_SAMPLE_RATE, SharedChartTime, Simulator};

/// Frames queued between the capture source and the analysis worker.
const FRAME_QUEUE: usize = 4;

#[derive(Parser, Debug)]
#[command(name = "riff", version, about = "Play along with a guitar chart and get every note judged")]
struct Args {
    /// Chart to play (.json flat form or .mss measure form)
    #[arg(default_value = "charts/example.json")]
    chart: PathBuf,

    /// Settings file
    #[arg(long, default_value = DEFAULT_SETTINGS_PATH)]
    settings: PathBuf,

    /// Latency offset in milliseconds, overriding the saved one
    #[arg(long, allow_hyphen_values = true)]
    offset: Option<i64>,

    /// Skip the menu and start playing immediately
    #[arg(long)]
    play: bool,

    /// Feed synthetic tones of the chart instead of a capture device
    #[arg(long)]
    simulate: bool,

    /// List input devices and exit
    #[cfg(feature = "audio")]
    #[arg(long)]
    list_devices: bool,
}

/// Whatever keeps frames flowing; dropping it stops capture.
enum CaptureSource {
    Simulated(Simulator),
    #[cfg(feature = "audio")]
    Device(cpal::Stream),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    #[cfg(feature = "audio")]
    if args.list_devices {
        for name in riff_core::audio::list_input_devices()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut settings = Settings::load(&args.settings)?;
    if let Some(offset) = args.offset {
        settings.latency_offset_ms = offset;
    }

    let chart = Arc::new(load_chart(&args.chart).unwrap_or_else(|e| {
        warn!("Could not load chart {}: {}. Using an empty chart.", args.chart.display(), e);
        Chart::empty()
    }));
    info!(
        "Chart '{}': {} notes, {:.0} BPM, {:.1} s",
        chart.title,
        chart.notes.len(),
        chart.tempo_bpm,
        chart.length_ms() as f64 / 1000.0
    );

    let cell = Arc::new(FrequencyCell::new());
    let chart_time = Arc::new(SharedChartTime::new());
    let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Vec<f32>>(FRAME_QUEUE);

    let (source, sample_rate) = start_capture(&args, &settings, &chart, &chart_time, frame_tx)?;
    let worker = AnalysisWorker::spawn(frame_rx, settings.analysis_config(sample_rate), Arc::clone(&cell))
        .context("Failed to start the analysis worker")?;

    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    input::spawn_stdin_reader(event_tx).context("Failed to start the input reader")?;
    info!("Commands: w/s move, enter select, digits pick a row, b back, p pause, +/- offset, q quit");

    let mut game = GameLoop::new(
        Arc::clone(&chart),
        cell,
        chart_time,
        settings.latency_offset_ms,
        settings.offset_step_ms,
    );
    if args.play {
        game.start_playing(Instant::now());
    }
    game.run(event_rx, Duration::from_millis(settings.tick_ms.max(1)));

    match source {
        CaptureSource::Simulated(simulator) => simulator.stop(),
        #[cfg(feature = "audio")]
        CaptureSource::Device(stream) => drop(stream),
    }
    worker.stop()?;

    settings.latency_offset_ms = game.offset_ms();
    settings.save(&args.settings)?;
    Ok(())
}

fn start_capture(
    args: &Args,
    settings: &Settings,
    chart: &Arc<Chart>,
    chart_time: &Arc<SharedChartTime>,
    frame_tx: crossbeam_channel::Sender<Vec<f32>>,
) -> Result<(CaptureSource, u32)> {
    #[cfg(feature = "audio")]
    if !args.simulate {
        let (stream, rate) =
            riff_core::audio::start_audio_capture(frame_tx, settings.input_device.as_deref(), settings.frame_size)
                .context("Failed to start audio capture")?;
        return Ok((CaptureSource::Device(stream), rate));
    }

    #[cfg(not(feature = "audio"))]
    if !args.simulate {
        warn!("Built without the `audio` feature; using simulated input");
        if let Some(device) = &settings.input_device {
            warn!("Ignoring configured input device '{}'", device);
        }
    }

    let simulator = Simulator::spawn(Arc::clone(chart), Arc::clone(chart_time), frame_tx, settings.frame_size)?;
    Ok((CaptureSource::Simulated(simulator), SIMULATED_SAMPLE_RATE))
}
