use std::sync::Arc;

use crate::core::lock::ExclusiveLock;
use crate::domain::{ExamSession, Rubric};

/// Handle to the grading state shared by every worker.
///
/// The rubric and the exam session sit behind independent locks. No code path holds
/// both at once.
#[derive(Clone)]
pub(crate) struct GradingState {
    inner: Arc<InnerState>,
}

struct InnerState {
    rubric: ExclusiveLock<Rubric>,
    progress: ExclusiveLock<ExamSession>,
}

impl GradingState {
    pub(crate) fn new(rubric: Rubric, session: ExamSession) -> Self {
        Self {
            inner: Arc::new(InnerState {
                rubric: ExclusiveLock::new("rubric", rubric),
                progress: ExclusiveLock::new("progress", session),
            }),
        }
    }

    pub(crate) fn rubric(&self) -> &ExclusiveLock<Rubric> {
        &self.inner.rubric
    }

    pub(crate) fn progress(&self) -> &ExclusiveLock<ExamSession> {
        &self.inner.progress
    }

    /// Closes both locks so every pending and future acquisition fails.
    pub(crate) fn abort(&self) {
        self.inner.rubric.close();
        self.inner.progress.close();
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.inner.rubric.is_closed() || self.inner.progress.is_closed()
    }

    /// Reclaims the state once no other handle is alive.
    pub(crate) fn into_parts(self) -> Result<(Rubric, ExamSession), Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(inner) => Ok((inner.rubric.into_inner(), inner.progress.into_inner())),
            Err(inner) => Err(Self { inner }),
        }
    }
}
