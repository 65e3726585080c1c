//! # Chart File Formats
//!
//! Two JSON encodings converge on [`Chart`]:
//!
//! - **Flat** (`.json`): every note carries its absolute onset in ms.
//! - **Measure** (`.mss`): notes are placed by beat inside 4/4 measures and
//!   converted to milliseconds using the chart tempo.
//!
//! Both loaders sort by onset and run [`validate`] before returning.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::chart::{Chart, ChartError, NoteEvent, validate};
use crate::tuning::{STRING_COUNT, Tuning};

/// Beats per measure assumed by the measure form.
pub const BEATS_PER_MEASURE: f64 = 4.0;

/// Sustain applied to flat-form notes that omit `len`.
pub const DEFAULT_FLAT_LEN_MS: i64 = 240;

#[derive(Debug, Default, Deserialize)]
struct Meta {
    bpm: Option<f64>,
    title: Option<String>,
    tuning: Option<Vec<i32>>,
}

impl Meta {
    /// Writes the present metadata fields over the chart defaults.
    fn apply(self, chart: &mut Chart) {
        if let Some(bpm) = self.bpm {
            chart.tempo_bpm = bpm;
        }
        if let Some(title) = self.title {
            chart.title = title;
        }
        if let Some(tuning) = self.tuning {
            // Only a complete six-string tuning replaces the default.
            if let Ok(strings) = <[i32; STRING_COUNT]>::try_from(tuning.as_slice()) {
                chart.tuning = Tuning(strings);
            }
        }
    }
}

// --- Flat form ---

#[derive(Debug, Deserialize)]
struct FlatFile {
    #[serde(default)]
    meta: Meta,
    #[serde(default)]
    notes: Vec<FlatNote>,
}

#[derive(Debug, Deserialize)]
struct FlatNote {
    #[serde(default)]
    t: i64,
    #[serde(default = "default_string")]
    str: i64,
    #[serde(default)]
    fret: i64,
    #[serde(default = "default_flat_len")]
    len: i64,
    slide: Option<i64>,
    #[serde(default)]
    techs: Vec<String>,
}

// --- Measure form ---

#[derive(Debug, Deserialize)]
struct MeasureFile {
    #[serde(default)]
    meta: Meta,
    #[serde(default)]
    measures: Vec<Measure>,
}

#[derive(Debug, Deserialize)]
struct Measure {
    #[serde(default)]
    notes: Vec<MeasureNote>,
}

#[derive(Debug, Deserialize)]
struct MeasureNote {
    #[serde(default)]
    beat: f64,
    #[serde(default = "default_string")]
    string: i64,
    #[serde(default)]
    fret: i64,
    #[serde(default)]
    sustain: f64,
}

fn default_string() -> i64 {
    1
}

fn default_flat_len() -> i64 {
    DEFAULT_FLAT_LEN_MS
}

fn string_number(index: usize, raw: i64) -> Result<u8, ChartError> {
    u8::try_from(raw).map_err(|_| ChartError::StringOutOfRange { index, string: raw })
}

fn fret_number(index: usize, raw: i64) -> Result<u8, ChartError> {
    u8::try_from(raw).map_err(|_| ChartError::FretOutOfRange { index, fret: raw })
}

/// Parses the flat encoding.
pub fn parse_flat(json: &str) -> Result<Chart, ChartError> {
    let file: FlatFile = serde_json::from_str(json)?;
    let mut chart = Chart::default();
    file.meta.apply(&mut chart);

    for (index, raw) in file.notes.into_iter().enumerate() {
        let slide_to_fret = match raw.slide {
            // Negative slide targets mean "no slide".
            Some(slide) if slide >= 0 => Some(fret_number(index, slide)?),
            _ => None,
        };
        chart.notes.push(NoteEvent {
            start_ms: raw.t,
            string: string_number(index, raw.str)?,
            fret: fret_number(index, raw.fret)?,
            duration_ms: raw.len,
            slide_to_fret,
            techniques: raw.techs.into_iter().collect::<BTreeSet<_>>(),
        });
    }

    sort_by_onset(&mut chart);
    validate(chart)
}

/// Parses the measure encoding.
pub fn parse_measures(json: &str) -> Result<Chart, ChartError> {
    let file: MeasureFile = serde_json::from_str(json)?;
    let mut chart = Chart::default();
    file.meta.apply(&mut chart);

    if !chart.tempo_bpm.is_finite() || chart.tempo_bpm <= 0.0 {
        return Err(ChartError::InvalidTempo(chart.tempo_bpm));
    }
    let beat_ms = 60_000.0 / chart.tempo_bpm;

    let mut index = 0;
    for (measure_index, measure) in file.measures.into_iter().enumerate() {
        let measure_start_beats = measure_index as f64 * BEATS_PER_MEASURE;
        for raw in measure.notes {
            let beat = raw.beat + measure_start_beats;
            chart.notes.push(NoteEvent {
                // f64::round rounds half away from zero.
                start_ms: (beat * beat_ms).round() as i64,
                string: string_number(index, raw.string)?,
                fret: fret_number(index, raw.fret)?,
                duration_ms: (raw.sustain * beat_ms).round() as i64,
                slide_to_fret: None,
                techniques: BTreeSet::new(),
            });
            index += 1;
        }
    }

    sort_by_onset(&mut chart);
    validate(chart)
}

/// Loads a chart from disk, choosing the encoding by file extension.
///
/// `.mss` files use the measure form; everything else is read as flat JSON.
pub fn load_chart(path: &Path) -> Result<Chart, ChartError> {
    let text = fs::read_to_string(path).map_err(|source| ChartError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_measure_form = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mss"));

    let chart = if is_measure_form {
        parse_measures(&text)?
    } else {
        parse_flat(&text)?
    };
    debug!(
        "Loaded chart '{}' from {}: {} notes at {} BPM",
        chart.title,
        path.display(),
        chart.notes.len(),
        chart.tempo_bpm
    );
    Ok(chart)
}

fn sort_by_onset(chart: &mut Chart) {
    // Stable, so notes sharing an onset keep their file order.
    chart.notes.sort_by_key(|n| n.start_ms);
}
