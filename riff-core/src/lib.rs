// riff-core/src/lib.rs

//! The core logic for the guitar practice trainer.
//! This crate turns a stream of frequency estimates into note judgments
//! against a timed chart: pitch classification, the playback clock, the
//! judgment engine, chart loading and the capture pipeline that feeds them.
//! It is completely headless and contains no rendering code.

#[cfg(feature = "audio")]
pub mod audio;
pub mod capture;
pub mod chart;
pub mod chart_format;
pub mod clock;
pub mod detect;
pub mod fft;
pub mod judge;
pub mod mode;
pub mod pitch;
pub mod session;
pub mod tuning;

pub use capture::{AnalysisConfig, AnalysisWorker, FrequencyCell, FrequencyRange};
pub use chart::{Chart, ChartError, NoteEvent, validate};
pub use chart_format::{load_chart, parse_flat, parse_measures};
pub use clock::PlaybackClock;
pub use judge::{HIT_WINDOW_MS, JudgmentEngine, JudgmentStats, NoteState, TickResult};
pub use mode::{MENU, MenuItem, Mode, ModeContext, ModeEvent};
pub use pitch::{ClassifiedPitch, FretPosition, classify, classify_with_tuning};
pub use session::{PlaySession, PlaySnapshot};
pub use tuning::Tuning;
