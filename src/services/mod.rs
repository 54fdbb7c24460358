pub(crate) mod exam_source;
pub(crate) mod rubric_store;

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::StudentIdError;

pub(crate) use exam_source::{DirectoryExamSource, ExamSource};
pub(crate) use rubric_store::{FileRubricStore, RubricStore};

#[derive(Debug, Error)]
pub(crate) enum SourceError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid record {path}: {source}")]
    InvalidStudentId {
        path: PathBuf,
        #[source]
        source: StudentIdError,
    },
}
