//! # Frequency Estimation
//!
//! Turns a frame of raw samples into a single fundamental-frequency estimate
//! for the capture thread to publish. YIN finds the period; the FFT spectrum
//! then nudges the result to sub-bin precision.

use crate::fft;

/// YIN dips above this value are treated as noise.
const CLARITY_THRESHOLD: f32 = 0.1;

/// A dip counts as the first candidate once it falls this close to the
/// global minimum.
const DIP_TOLERANCE: f32 = 0.05;

/// Lowest frequency YIN will report.
const MIN_DETECTABLE_HZ: f32 = 20.0;

/// Bins searched either side of the YIN estimate.
const SEARCH_RADIUS_BINS: f32 = 2.0;

/// Largest correction the spectral refinement may apply to a YIN estimate.
pub const MAX_REFINEMENT_CENTS: f32 = 20.0;

fn rms(signal: &[f32]) -> f32 {
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Vertex offset of the parabola through three equally spaced points,
/// relative to the middle one. `None` for a degenerate (flat) parabola.
fn parabolic_offset(left: f32, centre: f32, right: f32) -> Option<f32> {
    let curvature = left - 2.0 * centre + right;
    if curvature.abs() < 1e-9 {
        return None;
    }
    let offset = (left - right) / (2.0 * curvature);
    (offset.is_finite() && offset.abs() <= 1.0).then_some(offset)
}

/// Cumulative mean normalized difference for lags `0..half`.
///
/// Index 0 is pinned to 1 so that zero lag is never chosen.
fn normalized_difference(signal: &[f32], half: usize) -> Vec<f32> {
    let window = &signal[..half];
    let mut curve = Vec::with_capacity(half);
    curve.push(1.0);

    let mut running_sum = 0.0;
    for lag in 1..half {
        let shifted = &signal[lag..lag + half];
        let diff: f32 = window
            .iter()
            .zip(shifted)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        running_sum += diff;
        curve.push(if running_sum > 0.0 {
            diff * lag as f32 / running_sum
        } else {
            1.0
        });
    }
    curve
}

/// Lag at the bottom of the first dip that comes close to the global
/// minimum. Taking the first such dip rather than the deepest avoids
/// reporting an octave below the played note.
fn first_dip(curve: &[f32]) -> Option<usize> {
    let floor = curve[1..].iter().copied().fold(f32::INFINITY, f32::min);
    let start = (2..curve.len()).find(|&lag| curve[lag] < floor + DIP_TOLERANCE && curve[lag] < curve[lag - 1])?;
    let bottom = (start..curve.len() - 1)
        .find(|&lag| curve[lag + 1] >= curve[lag])
        .unwrap_or(curve.len() - 1);
    (curve[bottom] <= CLARITY_THRESHOLD).then_some(bottom)
}

/// YIN pitch estimate for one frame.
///
/// Frames quieter than `amplitude_threshold` (RMS), frames without a clear
/// periodic dip, and results at or below 20 Hz yield `None`.
pub fn detect_pitch_yin(signal: &[f32], sample_rate: u32, amplitude_threshold: f32) -> Option<f32> {
    let half = signal.len() / 2;
    if half < 3 || rms(signal) < amplitude_threshold {
        return None;
    }

    let curve = normalized_difference(signal, half);
    let lag = first_dip(&curve)?;
    if lag + 1 >= half {
        return None;
    }

    let shift = parabolic_offset(curve[lag - 1], curve[lag], curve[lag + 1]).unwrap_or(0.0);
    let frequency = sample_rate as f32 / (lag as f32 + shift);
    (frequency.is_finite() && frequency > MIN_DETECTABLE_HZ).then_some(frequency)
}

/// Moves `rough_freq` to the interpolated log-magnitude peak near it.
///
/// `magnitudes` holds the bins below Nyquist, so the FFT length is twice its
/// length. Returns `rough_freq` unchanged when the spectrum has no usable
/// peak there, and `None` only for a non-positive estimate.
pub fn refine_from_spectrum(magnitudes: &[f32], rough_freq: f32, sample_rate: u32) -> Option<f32> {
    if rough_freq <= 0.0 {
        return None;
    }
    let last = magnitudes.len().checked_sub(1).filter(|&last| last >= 2);
    let Some(last) = last else {
        return Some(rough_freq);
    };

    let bin_hz = sample_rate as f32 / (magnitudes.len() * 2) as f32;
    let centre = rough_freq / bin_hz;
    let low = (centre - SEARCH_RADIUS_BINS).max(1.0) as usize;
    let high = ((centre + SEARCH_RADIUS_BINS) as usize).min(last - 1);
    if low > high {
        return Some(rough_freq);
    }

    let peak = (low..=high).max_by(|&a, &b| magnitudes[a].total_cmp(&magnitudes[b]));
    let refined = peak.and_then(|bin| {
        let [left, mid, right] = [bin - 1, bin, bin + 1].map(|i| magnitudes[i].ln());
        if !(left.is_finite() && mid.is_finite() && right.is_finite()) {
            return None;
        }
        let shift = parabolic_offset(left, mid, right)?;
        let hz = (bin as f32 + shift) * bin_hz;
        (hz.is_finite() && hz > 0.0).then_some(hz)
    });
    Some(refined.unwrap_or(rough_freq))
}

/// Full per-frame estimate: YIN followed by spectral refinement.
///
/// The refinement is only accepted when it stays within
/// [`MAX_REFINEMENT_CENTS`] of the YIN estimate. Low notes sit a few bins
/// from DC where the spectral peak is unreliable.
pub fn estimate_frequency(frame: &[f32], sample_rate: u32, amplitude_threshold: f32) -> Option<f32> {
    let rough = detect_pitch_yin(frame, sample_rate, amplitude_threshold)?;
    let magnitudes = fft::spectrum_to_magnitudes(&fft::perform_fft(frame));
    let refined = refine_from_spectrum(&magnitudes, rough, sample_rate).unwrap_or(rough);
    let correction = 1200.0 * (refined / rough).log2();
    if correction.abs() <= MAX_REFINEMENT_CENTS {
        Some(refined)
    } else {
        Some(rough)
    }
}
