use serde::Serialize;

use super::types::StudentId;

/// Result of asking the exam source for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExamLoad {
    Student(StudentId),
    /// No record at this position; the stream is over.
    Exhausted,
    /// The record exists but is empty.
    Blank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum LoadKind {
    Student,
    Exhausted,
    Blank,
    Failed,
}

impl ExamLoad {
    pub(crate) fn kind(&self) -> LoadKind {
        match self {
            Self::Student(_) => LoadKind::Student,
            Self::Exhausted => LoadKind::Exhausted,
            Self::Blank => LoadKind::Blank,
        }
    }
}

/// The exam the whole pool is currently marking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExamSession {
    student: StudentId,
    marked: Vec<bool>,
    sequence: u32,
}

impl ExamSession {
    /// Empty session before the first load: sequence 0, identifier unset.
    pub(crate) fn new(question_count: usize) -> Self {
        Self { student: StudentId::default(), marked: vec![false; question_count], sequence: 0 }
    }

    pub(crate) fn student(&self) -> &StudentId {
        &self.student
    }

    pub(crate) fn sequence(&self) -> u32 {
        self.sequence
    }

    pub(crate) fn next_sequence(&self) -> u32 {
        self.sequence + 1
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.student.is_sentinel()
    }

    pub(crate) fn is_marked(&self, question: usize) -> bool {
        self.marked[question]
    }

    pub(crate) fn all_marked(&self) -> bool {
        self.marked.iter().all(|marked| *marked)
    }

    pub(crate) fn mark(&mut self, question: usize) {
        self.marked[question] = true;
    }

    /// Builds the session that replaces this one once record `sequence` was requested.
    ///
    /// A failed load (`None`) keeps the identifier and the flags, so the next completion
    /// check advances again. A blank record keeps the identifier but resets the flags.
    pub(crate) fn replaced_by(&self, sequence: u32, load: Option<&ExamLoad>) -> Self {
        let fresh = vec![false; self.marked.len()];
        match load {
            Some(ExamLoad::Student(student)) => {
                Self { student: student.clone(), marked: fresh, sequence }
            }
            Some(ExamLoad::Exhausted) => {
                Self { student: StudentId::sentinel(), marked: fresh, sequence }
            }
            Some(ExamLoad::Blank) => {
                Self { student: self.student.clone(), marked: fresh, sequence }
            }
            None => Self { student: self.student.clone(), marked: self.marked.clone(), sequence },
        }
    }
}
