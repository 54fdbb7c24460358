use std::path::PathBuf;

use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_mode, parse_u32, parse_u64, parse_usize_in,
};
use super::types::{
    ConfigError, DelayRange, MarkingSettings, Settings, StorageSettings, TelemetrySettings,
};

pub(crate) const MAX_QUESTIONS: usize = 64;

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let rubric_path = PathBuf::from(env_or_default("GRADER_RUBRIC_PATH", "rubric.txt"));
        let exam_dir = PathBuf::from(env_or_default("GRADER_EXAM_DIR", "exams"));
        let report_path = env_optional("GRADER_REPORT_PATH").map(PathBuf::from);

        let question_count = parse_usize_in(
            "GRADER_QUESTION_COUNT",
            env_or_default("GRADER_QUESTION_COUNT", "5"),
            1..=MAX_QUESTIONS,
        )?;
        let revision_odds =
            parse_u32("GRADER_REVISION_ODDS", env_or_default("GRADER_REVISION_ODDS", "10"))?;

        let review_delay = DelayRange::from_millis(
            parse_u64("GRADER_REVIEW_DELAY_MS", env_or_default("GRADER_REVIEW_DELAY_MS", "500"))?,
            parse_u64(
                "GRADER_REVIEW_JITTER_MS",
                env_or_default("GRADER_REVIEW_JITTER_MS", "500"),
            )?,
        );
        let marking_delay = DelayRange::from_millis(
            parse_u64(
                "GRADER_MARKING_DELAY_MS",
                env_or_default("GRADER_MARKING_DELAY_MS", "1000"),
            )?,
            parse_u64(
                "GRADER_MARKING_JITTER_MS",
                env_or_default("GRADER_MARKING_JITTER_MS", "1000"),
            )?,
        );

        let mode = parse_mode(env_optional("GRADER_MODE"))?;
        let seed =
            env_optional("GRADER_SEED").map(|value| parse_u64("GRADER_SEED", value)).transpose()?;

        let log_level = env_or_default("LOG_LEVEL", "info");
        let json = env_optional("LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        Ok(Self {
            storage: StorageSettings { rubric_path, exam_dir, report_path },
            marking: MarkingSettings {
                question_count,
                revision_odds,
                review_delay,
                marking_delay,
                mode,
                seed,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        })
    }

    pub(crate) fn storage(&self) -> &StorageSettings {
        &self.storage
    }

    pub(crate) fn marking(&self) -> &MarkingSettings {
        &self.marking
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }
}
