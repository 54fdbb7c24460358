use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) storage: StorageSettings,
    pub(crate) marking: MarkingSettings,
    pub(crate) telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct StorageSettings {
    pub(crate) rubric_path: PathBuf,
    pub(crate) exam_dir: PathBuf,
    pub(crate) report_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub(crate) struct MarkingSettings {
    pub(crate) question_count: usize,
    /// A rubric revision happens with probability `1 / revision_odds`; zero disables revisions.
    pub(crate) revision_odds: u32,
    pub(crate) review_delay: DelayRange,
    pub(crate) marking_delay: DelayRange,
    pub(crate) mode: MarkingMode,
    pub(crate) seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}

/// Simulated latency: `base` plus a uniformly drawn amount in `0..=jitter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DelayRange {
    pub(crate) base: Duration,
    pub(crate) jitter: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum MarkingMode {
    Synchronized,
    Unsynchronized,
}

impl MarkingMode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Synchronized => "synchronized",
            Self::Unsynchronized => "unsynchronized",
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid marking mode: {0}")]
    InvalidMode(String),
}

impl DelayRange {
    pub(crate) fn from_millis(base: u64, jitter: u64) -> Self {
        Self { base: Duration::from_millis(base), jitter: Duration::from_millis(jitter) }
    }

    pub(crate) fn sample<R: rand::Rng + ?Sized>(self, rng: &mut R) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return self.base;
        }
        self.base + Duration::from_millis(rng.gen_range(0..=jitter_ms))
    }
}

impl MarkingSettings {
    pub(crate) fn revision_roll<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> bool {
        self.revision_odds != 0 && rng.gen_ratio(1, self.revision_odds)
    }
}
