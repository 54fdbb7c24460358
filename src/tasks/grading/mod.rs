pub(crate) mod events;
mod report;
mod worker;

pub(crate) use events::{EventSink, GradingEvent};
pub(crate) use report::RunReport;
pub(crate) use worker::{Worker, WorkerError};

use crate::domain::{ExamSession, LoadKind, WorkerId};
use crate::services::ExamSource;

/// Replaces `session` with the next exam record. Used for the initial load and for every
/// advance, always with the progress lock held by the caller.
///
/// A failed load is logged and leaves the identifier and flags untouched.
pub(crate) async fn load_next_exam(
    session: &mut ExamSession,
    source: &dyn ExamSource,
    events: &EventSink,
    worker: Option<WorkerId>,
) {
    let sequence = session.next_sequence();
    let loaded = source.load(sequence).await;

    let outcome = match &loaded {
        Ok(load) => load.kind(),
        Err(err) => {
            tracing::warn!(exam = sequence, error = %err, "Failed to load exam record");
            LoadKind::Failed
        }
    };

    *session = session.replaced_by(sequence, loaded.as_ref().ok());
    events.emit(GradingEvent::ExamLoaded {
        worker,
        exam: sequence,
        student: session.student().clone(),
        outcome,
    });
}
