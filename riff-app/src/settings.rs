//! Persistent operator settings, stored as pretty-printed JSON.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use riff_core::{AnalysisConfig, FrequencyRange};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SETTINGS_PATH: &str = "riff_settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Substring of the input device name. `None` picks automatically.
    pub input_device: Option<String>,
    /// Samples per analysis frame.
    pub frame_size: usize,
    pub latency_offset_ms: i64,
    pub offset_step_ms: i64,
    /// Game-loop period.
    pub tick_ms: u64,
    pub min_hz: f32,
    pub max_hz: f32,
    /// RMS below which a frame counts as silence.
    pub amplitude_threshold: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_device: None,
            frame_size: 2048,
            latency_offset_ms: 0,
            offset_step_ms: 5,
            tick_ms: 16,
            min_hz: 20.0,
            max_hz: 2000.0,
            amplitude_threshold: 0.01,
        }
    }
}

impl Settings {
    /// Loads settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json).with_context(|| format!("Failed to write settings to {}", path.display()))?;
        info!("Settings saved to {}", path.display());
        Ok(())
    }

    pub fn analysis_config(&self, sample_rate: u32) -> AnalysisConfig {
        AnalysisConfig {
            sample_rate,
            amplitude_threshold: self.amplitude_threshold,
            range: FrequencyRange {
                min_hz: self.min_hz,
                max_hz: self.max_hz,
            },
        }
    }
}
