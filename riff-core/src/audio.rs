//! # Audio Capture Module
//!
//! Real-time input using CPAL. Samples are chunked into fixed-size frames
//! and handed to the analysis worker without ever blocking the audio
//! callback; when the worker falls behind, frames are dropped.
//!
//! Only compiled with the `audio` feature.

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::Sender;
use log::{error, info, warn};

/// Sample rate requested from the device.
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// Device names tried, in order, when none is configured.
pub const PREFERRED_DEVICES: [&str; 2] = ["Rocksmith", "Real Tone"];

/// Names of every input device on the default host.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let names = host
        .input_devices()?
        .filter_map(|device| device.name().ok())
        .collect();
    Ok(names)
}

/// Picks an input device.
///
/// A configured name is matched as a substring; otherwise the preferred
/// instrument cables are tried before falling back to the host default.
fn pick_input_device(host: &cpal::Host, wanted: Option<&str>) -> Result<cpal::Device> {
    let find = |needle: &str| -> Result<Option<cpal::Device>> {
        Ok(host
            .input_devices()?
            .find(|device| device.name().map(|n| n.contains(needle)).unwrap_or(false)))
    };

    if let Some(name) = wanted {
        match find(name)? {
            Some(device) => return Ok(device),
            None => warn!("Input device matching '{}' not found, using fallback", name),
        }
    }

    for name in PREFERRED_DEVICES {
        if let Some(device) = find(name)? {
            return Ok(device);
        }
    }

    host.default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))
}

/// Starts audio capture and streams fixed-size frames to `sender`.
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Stream handle (capture stops when it is
///   dropped) and the negotiated sample rate
/// * `Err(e)` - Error if no usable device or format exists
pub fn start_audio_capture(
    sender: Sender<Vec<f32>>,
    device_name: Option<&str>,
    frame_size: usize,
) -> Result<(cpal::Stream, u32)> {
    if frame_size == 0 {
        return Err(anyhow!("Frame size must be positive"));
    }

    let host = cpal::default_host();
    let device = pick_input_device(&host, device_name)?;

    info!("Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = TARGET_SAMPLE_RATE.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    let config: cpal::StreamConfig = config.into();

    info!("Selected sample rate: {} Hz, {} channel(s)", sample_rate, channels);

    let err_fn = |err| error!("An error occurred on the audio stream: {}", err);

    let mut audio_buffer: Vec<f32> = Vec::with_capacity(frame_size * 2);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            // Keep the first channel only.
            audio_buffer.extend(data.iter().step_by(channels.max(1)));

            while audio_buffer.len() >= frame_size {
                let frame = audio_buffer[..frame_size].to_vec();
                // A full channel means the analysis thread is behind; drop the frame.
                let _ = sender.try_send(frame);
                audio_buffer.drain(..frame_size);
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate))
}

/// Finds the best f32 input configuration for the target sample rate,
/// preferring mono.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            let in_range = c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0;
            let rate_penalty = if in_range { 0 } else { min_diff.min(max_diff) };
            (rate_penalty, c.channels())
        })
}
