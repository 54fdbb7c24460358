use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};

use async_trait::async_trait;

use crate::core::config::{
    DelayRange, MarkingMode, MarkingSettings, Settings, StorageSettings, TelemetrySettings,
};
use crate::domain::{ExamLoad, Rubric, RubricEntry, StudentId};
use crate::services::{ExamSource, RubricStore, SourceError};

/// Serializes tests that touch process environment variables.
pub(crate) fn env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Short delays and a fixed seed, so protocol tests finish quickly in paused time and
/// replay the same interleaving.
pub(crate) fn marking_settings(question_count: usize, revision_odds: u32) -> MarkingSettings {
    MarkingSettings {
        question_count,
        revision_odds,
        review_delay: DelayRange::from_millis(5, 5),
        marking_delay: DelayRange::from_millis(10, 10),
        mode: MarkingMode::Synchronized,
        seed: Some(7),
    }
}

/// Settings for in-process runs; storage paths only matter for the report.
pub(crate) fn settings(marking: MarkingSettings, report_path: Option<PathBuf>) -> Settings {
    Settings {
        storage: StorageSettings {
            rubric_path: PathBuf::from("rubric.txt"),
            exam_dir: PathBuf::from("exams"),
            report_path,
        },
        marking,
        telemetry: TelemetrySettings {
            log_level: "info".to_string(),
            json: false,
            prometheus_enabled: false,
        },
    }
}

/// Exam records held in memory. An empty string stands for a zero-byte (blank) record;
/// positions past the end are exhausted.
pub(crate) struct MemoryExamSource {
    records: Vec<String>,
    failing: HashSet<u32>,
}

impl MemoryExamSource {
    pub(crate) fn new(records: &[&str]) -> Self {
        Self {
            records: records.iter().map(|record| record.to_string()).collect(),
            failing: HashSet::new(),
        }
    }

    /// Makes loading record `sequence` fail with an I/O error.
    pub(crate) fn failing_on(mut self, sequence: u32) -> Self {
        self.failing.insert(sequence);
        self
    }
}

#[async_trait]
impl ExamSource for MemoryExamSource {
    async fn load(&self, sequence: u32) -> Result<ExamLoad, SourceError> {
        if self.failing.contains(&sequence) {
            return Err(SourceError::Io {
                path: PathBuf::from("memory"),
                source: io::Error::new(io::ErrorKind::Other, format!("record {sequence} failed")),
            });
        }

        let index = sequence.checked_sub(1).map(|index| index as usize);
        let Some(record) = index.and_then(|index| self.records.get(index)) else {
            return Ok(ExamLoad::Exhausted);
        };
        if record.is_empty() {
            return Ok(ExamLoad::Blank);
        }

        let student = StudentId::parse(record).map_err(|source| SourceError::InvalidStudentId {
            path: PathBuf::from("memory"),
            source,
        })?;
        Ok(ExamLoad::Student(student))
    }
}

/// Rubric store that keeps every saved snapshot.
#[derive(Default)]
pub(crate) struct MemoryRubricStore {
    initial: Vec<RubricEntry>,
    saved: Mutex<Vec<Vec<u8>>>,
}

impl MemoryRubricStore {
    pub(crate) fn with_entries(initial: Vec<RubricEntry>) -> Self {
        Self { initial, saved: Mutex::default() }
    }

    pub(crate) fn saves(&self) -> usize {
        self.saved.lock().expect("saved snapshots").len()
    }

    pub(crate) fn last_saved(&self) -> Option<Vec<u8>> {
        self.saved.lock().expect("saved snapshots").last().cloned()
    }
}

#[async_trait]
impl RubricStore for MemoryRubricStore {
    async fn load(&self) -> Result<Vec<RubricEntry>, SourceError> {
        Ok(self.initial.clone())
    }

    async fn save(&self, rubric: &Rubric) -> Result<(), SourceError> {
        self.saved.lock().expect("saved snapshots").push(rubric.to_bytes());
        Ok(())
    }
}
