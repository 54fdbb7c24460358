use std::sync::Arc;

use anyhow::Context;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;

use crate::core::config::{MarkingMode, MarkingSettings, Settings};
use crate::core::metrics::WORKER_FAILURES;
use crate::core::state::GradingState;
use crate::core::time::{format_offset, now_utc};
use crate::domain::{ExamSession, Rubric, WorkerId};
use crate::services::{ExamSource, RubricStore};
use crate::tasks::grading::{self, events, GradingEvent, RunReport, Worker, WorkerError};

pub(crate) const MIN_WORKERS: usize = 2;

#[derive(Debug, Error)]
pub(crate) enum CoordinatorError {
    #[error("at least {MIN_WORKERS} workers are required, got {0}")]
    TooFewWorkers(usize),
    #[error("at least one question is required")]
    NoQuestions,
    #[error("{failed} of {total} workers terminated abnormally")]
    WorkersFailed { failed: usize, total: usize },
    #[error("grading state is still referenced by a running worker")]
    StateStillShared,
}

/// Owns the worker pool and the shared grading state for one run.
///
/// Dropping a coordinator aborts any worker that is still running.
pub(crate) struct Coordinator {
    run_id: Uuid,
    mode: MarkingMode,
    worker_count: usize,
    question_count: usize,
    started_at: OffsetDateTime,
    state: GradingState,
    workers: JoinSet<Result<WorkerId, WorkerError>>,
    events: UnboundedReceiver<GradingEvent>,
}

impl Coordinator {
    /// Loads the rubric and the first exam, then spawns `worker_count` workers on the
    /// shared state.
    pub(crate) async fn start(
        worker_count: usize,
        marking: &MarkingSettings,
        rubric_store: Arc<dyn RubricStore>,
        exams: Arc<dyn ExamSource>,
    ) -> Result<Self, CoordinatorError> {
        if worker_count < MIN_WORKERS {
            return Err(CoordinatorError::TooFewWorkers(worker_count));
        }
        if marking.question_count == 0 {
            return Err(CoordinatorError::NoQuestions);
        }

        let run_id = Uuid::new_v4();
        let (sink, events) = events::channel();

        let mut rubric = Rubric::new(marking.question_count);
        match rubric_store.load().await {
            Ok(entries) => {
                let applied = rubric.apply(&entries);
                tracing::info!(
                    applied,
                    questions = rubric.len(),
                    rubric = %rubric,
                    "Rubric loaded"
                );
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    rubric = %rubric,
                    "Failed to load rubric; using defaults"
                );
            }
        }

        let mut session = ExamSession::new(marking.question_count);
        grading::load_next_exam(&mut session, exams.as_ref(), &sink, None).await;
        if session.student().is_unset() {
            tracing::warn!("First exam could not be loaded; marking with an unset student id");
        }

        let state = GradingState::new(rubric, session);
        let mut workers = JoinSet::new();
        for id in 1..=worker_count {
            let worker = Worker::new(
                WorkerId(id),
                state.clone(),
                exams.clone(),
                rubric_store.clone(),
                marking.clone(),
                sink.clone(),
            );
            let span = tracing::info_span!("worker", %run_id, worker = id);
            workers.spawn(worker.run().instrument(span));
        }

        tracing::info!(
            %run_id,
            workers = worker_count,
            questions = marking.question_count,
            mode = marking.mode.as_str(),
            "Marking pool started"
        );

        Ok(Self {
            run_id,
            mode: marking.mode,
            worker_count,
            question_count: marking.question_count,
            started_at: now_utc(),
            state,
            workers,
            events,
        })
    }

    pub(crate) fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Joins every worker. A failed or panicked worker aborts the shared state so the
    /// rest stop at their next lock acquisition; this never waits on a dead worker.
    pub(crate) async fn await_completion(&mut self) -> Result<(), CoordinatorError> {
        let mut failed = 0;

        while let Some(joined) = self.workers.join_next().await {
            match joined {
                Ok(Ok(worker)) => tracing::debug!(%worker, "Worker joined"),
                Ok(Err(err)) => {
                    failed += 1;
                    tracing::error!(error = %err, "Worker terminated abnormally");
                }
                Err(err) => {
                    failed += 1;
                    self.state.abort();
                    metrics::counter!(WORKER_FAILURES).increment(1);
                    tracing::error!(error = %err, "Worker task join failed");
                }
            }
        }

        tracing::info!(failed, aborted = self.state.is_aborted(), "Worker pool joined");
        if failed > 0 {
            return Err(CoordinatorError::WorkersFailed { failed, total: self.worker_count });
        }
        Ok(())
    }

    /// Makes every pending and future lock acquisition fail.
    #[cfg(test)]
    pub(crate) fn abort(&self) {
        tracing::warn!(run_id = %self.run_id, "Aborting marking run");
        self.state.abort();
    }

    /// Tears down the shared state and collects the run report. Only succeeds once every
    /// worker has been joined.
    pub(crate) fn shutdown(mut self) -> Result<RunReport, CoordinatorError> {
        if !self.workers.is_empty() {
            return Err(CoordinatorError::StateStillShared);
        }
        let (rubric, session) =
            self.state.into_parts().map_err(|_| CoordinatorError::StateStillShared)?;

        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }

        Ok(RunReport::new(
            self.run_id,
            self.mode,
            self.worker_count,
            self.question_count,
            format_offset(self.started_at),
            format_offset(now_utc()),
            rubric.to_string(),
            session.sequence(),
            session.student().clone(),
            events,
        ))
    }
}

pub(crate) async fn run(
    settings: &Settings,
    worker_count: usize,
    rubric_store: Arc<dyn RubricStore>,
    exams: Arc<dyn ExamSource>,
) -> anyhow::Result<RunReport> {
    let span = tracing::info_span!("marking_run", run_id = tracing::field::Empty);

    async move {
        let mut coordinator =
            Coordinator::start(worker_count, settings.marking(), rubric_store, exams)
                .await
                .context("Failed to start marking pool")?;
        tracing::Span::current().record("run_id", tracing::field::display(coordinator.run_id()));

        let completion = coordinator.await_completion().await;
        let report = coordinator.shutdown().context("Failed to tear down grading state")?;

        tracing::info!(
            claims = report.summary.claims,
            duplicate_claims = report.summary.duplicate_claims,
            exams_completed = report.summary.exams_completed,
            rubric_revisions = report.summary.rubric_revisions,
            final_rubric = %report.final_rubric,
            "Marking run finished"
        );
        if let Some(rendered) = crate::core::metrics::render() {
            tracing::debug!(metrics = %rendered, "Final metrics");
        }
        let written = match &settings.storage().report_path {
            Some(path) => report.write_json(path).await,
            None => Ok(()),
        };

        settle(completion, written)?;
        Ok(report)
    }
    .instrument(span)
    .await
}

/// A failed worker outranks a failed report write; the write error is only logged then.
fn settle(
    completion: Result<(), CoordinatorError>,
    written: anyhow::Result<()>,
) -> anyhow::Result<()> {
    if let Err(err) = completion {
        if let Err(write_err) = written {
            tracing::error!(error = %format!("{write_err:#}"), "Failed to write run report");
        }
        return Err(err).context("Marking run did not complete cleanly");
    }
    written
}
