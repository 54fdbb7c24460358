use std::io;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::{ExamLoad, StudentId};
use crate::services::SourceError;

/// Ordered supply of exam records, numbered from 1.
#[async_trait]
pub(crate) trait ExamSource: Send + Sync {
    async fn load(&self, sequence: u32) -> Result<ExamLoad, SourceError>;
}

/// Reads `exam_NN.txt` records from a directory. The first line of a record is the
/// student identifier.
#[derive(Debug, Clone)]
pub(crate) struct DirectoryExamSource {
    dir: PathBuf,
}

impl DirectoryExamSource {
    pub(crate) fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub(crate) fn record_path(&self, sequence: u32) -> PathBuf {
        self.dir.join(format!("exam_{sequence:02}.txt"))
    }
}

#[async_trait]
impl ExamSource for DirectoryExamSource {
    async fn load(&self, sequence: u32) -> Result<ExamLoad, SourceError> {
        let path = self.record_path(sequence);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(ExamLoad::Exhausted),
            Err(source) => return Err(SourceError::Io { path, source }),
        };

        // An empty file has no first line at all; an empty first line is an empty id.
        if contents.is_empty() {
            return Ok(ExamLoad::Blank);
        }

        let first_line = contents.lines().next().unwrap_or_default();
        let student = StudentId::parse(first_line)
            .map_err(|source| SourceError::InvalidStudentId { path, source })?;
        if student.is_sentinel() {
            return Ok(ExamLoad::Exhausted);
        }

        Ok(ExamLoad::Student(student))
    }
}
