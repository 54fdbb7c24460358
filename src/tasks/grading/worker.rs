use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::time::sleep;

use crate::core::config::{MarkingMode, MarkingSettings};
use crate::core::lock::LockError;
use crate::core::metrics::{EXAMS_COMPLETED, QUESTIONS_CLAIMED, RUBRIC_REVISIONS, WORKER_FAILURES};
use crate::core::state::GradingState;
use crate::domain::{StudentId, WorkerId, WorkerPhase};
use crate::services::{ExamSource, RubricStore};
use crate::tasks::grading::events::{EventSink, GradingEvent};
use crate::tasks::grading::load_next_exam;

#[derive(Debug, Error)]
pub(crate) enum WorkerError {
    #[error("worker {worker} could not acquire a lock: {source}")]
    Lock {
        worker: WorkerId,
        #[source]
        source: LockError,
    },
}

/// One member of the marking pool.
///
/// Each loop iteration checks for the shutdown sentinel, reviews the rubric, claims at
/// most one unmarked question of the current exam, and advances to the next exam when
/// the current one is fully claimed. A lock is never held while acquiring the other.
pub(crate) struct Worker {
    id: WorkerId,
    state: GradingState,
    exams: Arc<dyn ExamSource>,
    rubric_store: Arc<dyn RubricStore>,
    marking: MarkingSettings,
    events: EventSink,
    rng: StdRng,
    phase: WorkerPhase,
}

impl Worker {
    pub(crate) fn new(
        id: WorkerId,
        state: GradingState,
        exams: Arc<dyn ExamSource>,
        rubric_store: Arc<dyn RubricStore>,
        marking: MarkingSettings,
        events: EventSink,
    ) -> Self {
        let rng = match marking.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id.0 as u64)),
            None => StdRng::from_entropy(),
        };

        Self { id, state, exams, rubric_store, marking, events, rng, phase: WorkerPhase::Running }
    }

    pub(crate) async fn run(mut self) -> Result<WorkerId, WorkerError> {
        self.events.emit(GradingEvent::WorkerStarted { worker: self.id });

        match self.mark_until_shutdown().await {
            Ok(()) => {
                self.enter(WorkerPhase::Terminated);
                self.events.emit(GradingEvent::WorkerStopped { worker: self.id });
                Ok(self.id)
            }
            Err(source) => {
                self.state.abort();
                metrics::counter!(WORKER_FAILURES).increment(1);
                self.events.emit(GradingEvent::WorkerFailed {
                    worker: self.id,
                    reason: source.to_string(),
                });
                Err(WorkerError::Lock { worker: self.id, source })
            }
        }
    }

    async fn mark_until_shutdown(&mut self) -> Result<(), LockError> {
        loop {
            self.enter(WorkerPhase::Running);
            if self.shutdown_observed().await? {
                return Ok(());
            }

            self.enter(WorkerPhase::CheckingRubric);
            self.review_rubric().await?;

            self.enter(WorkerPhase::ClaimingQuestion);
            self.claim_question().await?;

            self.enter(WorkerPhase::AdvancingExam);
            self.advance_if_complete().await?;
        }
    }

    fn enter(&mut self, phase: WorkerPhase) {
        if self.phase != phase {
            tracing::trace!(
                worker = %self.id,
                from = self.phase.as_str(),
                to = phase.as_str(),
                "Worker phase changed"
            );
            self.phase = phase;
        }
    }

    async fn shutdown_observed(&self) -> Result<bool, LockError> {
        let session = self.state.progress().acquire().await?;
        Ok(session.is_finished())
    }

    async fn review_rubric(&mut self) -> Result<(), LockError> {
        for question in 0..self.marking.question_count {
            sleep(self.marking.review_delay.sample(&mut self.rng)).await;
            if !self.marking.revision_roll(&mut self.rng) {
                continue;
            }

            match self.marking.mode {
                MarkingMode::Synchronized => self.revise_rubric(question).await?,
                MarkingMode::Unsynchronized => self.revise_rubric_unguarded(question).await?,
            }
        }
        Ok(())
    }

    async fn revise_rubric(&self, question: usize) -> Result<(), LockError> {
        let mut rubric = self.state.rubric().acquire().await?;
        let (from, to) = rubric.bump(question);
        self.record_revision(question, from, to);

        if let Err(err) = self.rubric_store.save(&rubric).await {
            tracing::warn!(worker = %self.id, error = %err, "Failed to persist rubric revision");
        }
        Ok(())
    }

    /// Read and write happen under separate acquisitions, so revisions can be lost.
    async fn revise_rubric_unguarded(&self, question: usize) -> Result<(), LockError> {
        let from = self.state.rubric().acquire().await?.marker(question);
        tokio::task::yield_now().await;

        let mut rubric = self.state.rubric().acquire().await?;
        let to = from.wrapping_add(1);
        rubric.set(question, to);
        self.record_revision(question, from, to);

        if let Err(err) = self.rubric_store.save(&rubric).await {
            tracing::warn!(worker = %self.id, error = %err, "Failed to persist rubric revision");
        }
        Ok(())
    }

    fn record_revision(&self, question: usize, from: u8, to: u8) {
        metrics::counter!(RUBRIC_REVISIONS, "mode" => self.marking.mode.as_str())
            .increment(1);
        self.events.emit(GradingEvent::RubricRevised {
            worker: self.id,
            question,
            from: char::from(from),
            to: char::from(to),
        });
    }

    /// Claims the first unmarked question of the current exam, if any. Returns `None`
    /// when every question is taken or the shutdown sentinel is visible.
    async fn claim_question(&mut self) -> Result<Option<usize>, LockError> {
        for question in 0..self.marking.question_count {
            let claimed = match self.marking.mode {
                MarkingMode::Synchronized => self.try_claim(question).await?,
                MarkingMode::Unsynchronized => self.try_claim_unguarded(question).await?,
            };

            match claimed {
                Claim::Taken => {
                    sleep(self.marking.marking_delay.sample(&mut self.rng)).await;
                    return Ok(Some(question));
                }
                Claim::Unavailable => continue,
                Claim::Shutdown => return Ok(None),
            }
        }
        Ok(None)
    }

    async fn try_claim(&self, question: usize) -> Result<Claim, LockError> {
        let mut session = self.state.progress().acquire().await?;
        if session.is_finished() {
            return Ok(Claim::Shutdown);
        }
        if session.is_marked(question) {
            return Ok(Claim::Unavailable);
        }

        session.mark(question);
        self.record_claim(session.sequence(), session.student(), question);
        Ok(Claim::Taken)
    }

    /// The flag is tested and set under separate acquisitions, so two workers can both
    /// claim the same question.
    async fn try_claim_unguarded(&self, question: usize) -> Result<Claim, LockError> {
        {
            let session = self.state.progress().acquire().await?;
            if session.is_finished() {
                return Ok(Claim::Shutdown);
            }
            if session.is_marked(question) {
                return Ok(Claim::Unavailable);
            }
        }
        tokio::task::yield_now().await;

        let mut session = self.state.progress().acquire().await?;
        session.mark(question);
        self.record_claim(session.sequence(), session.student(), question);
        Ok(Claim::Taken)
    }

    fn record_claim(&self, exam: u32, student: &StudentId, question: usize) {
        metrics::counter!(QUESTIONS_CLAIMED, "mode" => self.marking.mode.as_str())
            .increment(1);
        self.events.emit(GradingEvent::QuestionClaimed {
            worker: self.id,
            exam,
            student: student.clone(),
            question,
        });
    }

    /// Advances to the next exam when every question of the current one is claimed.
    /// Returns whether this worker performed the advance.
    async fn advance_if_complete(&self) -> Result<bool, LockError> {
        if self.marking.mode == MarkingMode::Unsynchronized {
            return self.advance_if_complete_unguarded().await;
        }

        let mut session = self.state.progress().acquire().await?;
        if session.is_finished() || !session.all_marked() {
            return Ok(false);
        }

        self.record_completion(session.sequence(), session.student());
        load_next_exam(&mut session, self.exams.as_ref(), &self.events, Some(self.id)).await;
        Ok(true)
    }

    /// Completion is tested and acted on under separate acquisitions, so one exam can be
    /// advanced twice and a student skipped.
    async fn advance_if_complete_unguarded(&self) -> Result<bool, LockError> {
        {
            let session = self.state.progress().acquire().await?;
            if session.is_finished() || !session.all_marked() {
                return Ok(false);
            }
        }
        tokio::task::yield_now().await;

        let mut session = self.state.progress().acquire().await?;
        self.record_completion(session.sequence(), session.student());
        load_next_exam(&mut session, self.exams.as_ref(), &self.events, Some(self.id)).await;
        Ok(true)
    }

    fn record_completion(&self, exam: u32, student: &StudentId) {
        metrics::counter!(EXAMS_COMPLETED, "mode" => self.marking.mode.as_str())
            .increment(1);
        self.events.emit(GradingEvent::ExamCompleted {
            worker: self.id,
            exam,
            student: student.clone(),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    Taken,
    Unavailable,
    Shutdown,
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::domain::{ExamLoad, ExamSession, Rubric};
    use crate::test_support::{marking_settings, MemoryExamSource, MemoryRubricStore};

    struct Fixture {
        worker: Worker,
        state: GradingState,
        events: UnboundedReceiver<GradingEvent>,
        rubric_store: Arc<MemoryRubricStore>,
    }

    fn fixture(students: &[&str], revision_odds: u32) -> Fixture {
        let marking = marking_settings(3, revision_odds);
        let session = ExamSession::new(3).replaced_by(
            1,
            Some(&ExamLoad::Student(StudentId::parse(students[0]).expect("id"))),
        );
        let state = GradingState::new(Rubric::new(3), session);
        let (sink, events) = crate::tasks::grading::events::channel();
        let rubric_store = Arc::new(MemoryRubricStore::default());
        let worker = Worker::new(
            WorkerId(1),
            state.clone(),
            Arc::new(MemoryExamSource::new(students)),
            rubric_store.clone(),
            marking,
            sink,
        );
        Fixture { worker, state, events, rubric_store }
    }

    fn drain(events: &mut UnboundedReceiver<GradingEvent>) -> Vec<GradingEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn claim_takes_exactly_one_question_per_call() {
        let mut fx = fixture(&["S1"], 0);

        assert_eq!(fx.worker.claim_question().await.expect("claim"), Some(0));
        assert_eq!(fx.worker.claim_question().await.expect("claim"), Some(1));

        let session = fx.state.progress().acquire().await.expect("lock");
        assert!(session.is_marked(0));
        assert!(session.is_marked(1));
        assert!(!session.is_marked(2));
    }

    #[tokio::test(start_paused = true)]
    async fn claim_skips_questions_taken_by_others() {
        let mut fx = fixture(&["S1"], 0);
        {
            let mut session = fx.state.progress().acquire().await.expect("lock");
            session.mark(0);
            session.mark(1);
        }

        assert_eq!(fx.worker.claim_question().await.expect("claim"), Some(2));
        assert_eq!(fx.worker.claim_question().await.expect("claim"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_claimed_or_advanced_after_the_sentinel() {
        let mut fx = fixture(&["S1"], 0);
        {
            let mut session = fx.state.progress().acquire().await.expect("lock");
            *session = session.replaced_by(2, Some(&ExamLoad::Exhausted));
        }

        assert_eq!(fx.worker.claim_question().await.expect("claim"), None);
        assert!(!fx.worker.advance_if_complete().await.expect("advance"));
        assert!(fx.worker.shutdown_observed().await.expect("check"));
        assert!(drain(&mut fx.events).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn advance_waits_for_every_question() {
        let mut fx = fixture(&["S1", "S2"], 0);

        fx.worker.claim_question().await.expect("claim");
        fx.worker.claim_question().await.expect("claim");
        assert!(!fx.worker.advance_if_complete().await.expect("advance"));

        fx.worker.claim_question().await.expect("claim");
        assert!(fx.worker.advance_if_complete().await.expect("advance"));
        assert!(!fx.worker.advance_if_complete().await.expect("advance"));

        let session = fx.state.progress().acquire().await.expect("lock");
        assert_eq!(session.sequence(), 2);
        assert_eq!(session.student().as_str(), "S2");
        assert!(!session.all_marked());
    }

    #[tokio::test(start_paused = true)]
    async fn certain_revisions_bump_every_question_and_persist() {
        let mut fx = fixture(&["S1"], 1);

        fx.worker.review_rubric().await.expect("review");

        let rubric = fx.state.rubric().acquire().await.expect("lock");
        assert_eq!(rubric.to_string(), "BBB");
        assert_eq!(fx.rubric_store.saves(), 3);
        assert_eq!(fx.rubric_store.last_saved().as_deref(), Some(&b"1,B\n2,B\n3,B\n"[..]));
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_once_the_stream_is_exhausted() {
        let fx = fixture(&["S1"], 0);
        let mut events = fx.events;

        let worker = fx.worker.run().await.expect("run");
        assert_eq!(worker, WorkerId(1));

        let events = drain(&mut events);
        let claims = events
            .iter()
            .filter(|event| matches!(event, GradingEvent::QuestionClaimed { .. }))
            .count();
        assert_eq!(claims, 3);
        assert_eq!(events.last(), Some(&GradingEvent::WorkerStopped { worker: WorkerId(1) }));
    }

    #[tokio::test(start_paused = true)]
    async fn lock_failure_aborts_the_shared_state() {
        let fx = fixture(&["S1"], 0);
        fx.state.progress().close();

        let err = fx.worker.run().await.expect_err("closed lock");
        assert!(matches!(err, WorkerError::Lock { worker: WorkerId(1), .. }));
        assert!(fx.state.rubric().is_closed());
    }
}
