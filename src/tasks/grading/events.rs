use serde::Serialize;
use tokio::sync::mpsc;

use crate::domain::{LoadKind, StudentId, WorkerId};

/// State transitions reported by the coordinator and the workers. Question indices are
/// 0-based; log lines show them 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub(crate) enum GradingEvent {
    WorkerStarted { worker: WorkerId },
    RubricRevised { worker: WorkerId, question: usize, from: char, to: char },
    QuestionClaimed { worker: WorkerId, exam: u32, student: StudentId, question: usize },
    ExamCompleted { worker: WorkerId, exam: u32, student: StudentId },
    ExamLoaded { worker: Option<WorkerId>, exam: u32, student: StudentId, outcome: LoadKind },
    WorkerStopped { worker: WorkerId },
    WorkerFailed { worker: WorkerId, reason: String },
}

#[derive(Clone)]
pub(crate) struct EventSink {
    tx: mpsc::UnboundedSender<GradingEvent>,
}

pub(crate) fn channel() -> (EventSink, mpsc::UnboundedReceiver<GradingEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, rx)
}

impl EventSink {
    pub(crate) fn emit(&self, event: GradingEvent) {
        log_event(&event);
        if self.tx.send(event).is_err() {
            tracing::debug!("Event receiver dropped; event only logged");
        }
    }
}

fn log_event(event: &GradingEvent) {
    match event {
        GradingEvent::WorkerStarted { worker } => {
            tracing::info!(%worker, "TA {worker} - Started");
        }
        GradingEvent::RubricRevised { worker, question, from, to } => {
            tracing::info!(
                %worker,
                question = question + 1,
                %from,
                %to,
                "TA {worker} - Rubric change Q{}: {from} -> {to}",
                question + 1
            );
        }
        GradingEvent::QuestionClaimed { worker, exam, student, question } => {
            tracing::info!(
                %worker,
                exam,
                %student,
                question = question + 1,
                "TA {worker} - Marking Student {student}, Q{}",
                question + 1
            );
        }
        GradingEvent::ExamCompleted { worker, exam, student } => {
            tracing::info!(%worker, exam, %student, "Student {student}'s exam marking complete");
        }
        GradingEvent::ExamLoaded { worker, exam, student, outcome } => match outcome {
            LoadKind::Student => {
                tracing::info!(
                    ?worker,
                    exam,
                    %student,
                    "Loaded exam {exam}. New Student ID: {student}"
                );
            }
            LoadKind::Exhausted => {
                tracing::info!(?worker, exam, "No exam {exam}; shutdown sentinel loaded");
            }
            LoadKind::Blank => {
                tracing::warn!(
                    ?worker,
                    exam,
                    %student,
                    "Exam {exam} has no student id; re-marking {student}"
                );
            }
            LoadKind::Failed => {
                tracing::warn!(?worker, exam, %student, "Exam {exam} skipped; keeping {student}");
            }
        },
        GradingEvent::WorkerStopped { worker } => {
            tracing::info!(%worker, "TA {worker} - Nothing left to do");
        }
        GradingEvent::WorkerFailed { worker, reason } => {
            tracing::error!(%worker, reason = %reason, "TA {worker} - Terminated abnormally");
        }
    }
}
