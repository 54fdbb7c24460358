use std::sync::OnceLock;

use anyhow::Context;
use metrics::{describe_counter, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

pub(crate) const QUESTIONS_CLAIMED: &str = "questions_claimed_total";
pub(crate) const RUBRIC_REVISIONS: &str = "rubric_revisions_total";
pub(crate) const EXAMS_COMPLETED: &str = "exams_completed_total";
pub(crate) const WORKER_FAILURES: &str = "worker_failures_total";

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder when enabled. Without it every counter is a no-op.
pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    describe_counters();
    if PROM_HANDLE.set(handle).is_err() {
        tracing::debug!("Prometheus handle already set");
    }
    Ok(())
}

fn describe_counters() {
    describe_counter!(QUESTIONS_CLAIMED, Unit::Count, "Questions claimed by a worker");
    describe_counter!(RUBRIC_REVISIONS, Unit::Count, "Rubric markers advanced by a worker");
    describe_counter!(EXAMS_COMPLETED, Unit::Count, "Exams advanced past after full marking");
    describe_counter!(WORKER_FAILURES, Unit::Count, "Workers that terminated abnormally");
}

/// Prometheus text exposition of the counters, if the recorder is installed.
pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
