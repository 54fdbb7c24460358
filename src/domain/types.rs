use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Student identifier that marks the end of the exam stream.
pub(crate) const SHUTDOWN_SENTINEL: &str = "9999";

pub(crate) const MAX_STUDENT_ID_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub(crate) struct StudentId(String);

#[derive(Debug, Error)]
pub(crate) enum StudentIdError {
    #[error("student id {0:?} exceeds {MAX_STUDENT_ID_LEN} characters")]
    TooLong(String),
}

impl StudentId {
    pub(crate) fn parse(raw: &str) -> Result<Self, StudentIdError> {
        let trimmed = raw.trim();
        if trimmed.chars().count() > MAX_STUDENT_ID_LEN {
            return Err(StudentIdError::TooLong(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub(crate) fn sentinel() -> Self {
        Self(SHUTDOWN_SENTINEL.to_string())
    }

    pub(crate) fn is_sentinel(&self) -> bool {
        self.0 == SHUTDOWN_SENTINEL
    }

    pub(crate) fn is_unset(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
impl StudentId {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordinal assigned at spawn; diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub(crate) struct WorkerId(pub(crate) usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerPhase {
    Running,
    CheckingRubric,
    ClaimingQuestion,
    AdvancingExam,
    Terminated,
}

impl WorkerPhase {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::CheckingRubric => "checking_rubric",
            Self::ClaimingQuestion => "claiming_question",
            Self::AdvancingExam => "advancing_exam",
            Self::Terminated => "terminated",
        }
    }
}
