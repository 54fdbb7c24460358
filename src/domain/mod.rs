mod rubric;
mod session;
mod types;

pub(crate) use rubric::{parse_entries, Rubric, RubricEntry};
pub(crate) use session::{ExamLoad, ExamSession, LoadKind};
pub(crate) use types::{StudentId, StudentIdError, WorkerId, WorkerPhase};
