pub(crate) mod core;
pub(crate) mod domain;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::{config::Settings, telemetry};
use crate::services::{DirectoryExamSource, FileRubricStore};

pub async fn run(worker_count: usize) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let rubric_store = Arc::new(FileRubricStore::new(settings.storage().rubric_path.clone()));
    let exams = Arc::new(DirectoryExamSource::new(settings.storage().exam_dir.clone()));

    tracing::info!(
        rubric = %settings.storage().rubric_path.display(),
        exams = %settings.storage().exam_dir.display(),
        workers = worker_count,
        "Marking pool starting"
    );

    let report = tasks::scheduler::run(&settings, worker_count, rubric_store, exams).await?;
    tracing::info!(
        run_id = %report.run_id,
        final_exam = report.final_exam,
        "Marking pool finished"
    );

    Ok(())
}
