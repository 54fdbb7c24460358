use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::{parse_entries, Rubric, RubricEntry};
use crate::services::SourceError;

#[async_trait]
pub(crate) trait RubricStore: Send + Sync {
    async fn load(&self) -> Result<Vec<RubricEntry>, SourceError>;

    /// Replaces the persisted rubric with `rubric` as a whole.
    async fn save(&self, rubric: &Rubric) -> Result<(), SourceError>;
}

/// Line-oriented `question,marker` file.
#[derive(Debug, Clone)]
pub(crate) struct FileRubricStore {
    path: PathBuf,
}

impl FileRubricStore {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RubricStore for FileRubricStore {
    async fn load(&self) -> Result<Vec<RubricEntry>, SourceError> {
        let contents = tokio::fs::read(&self.path)
            .await
            .map_err(|source| SourceError::Io { path: self.path.clone(), source })?;
        Ok(parse_entries(&contents))
    }

    async fn save(&self, rubric: &Rubric) -> Result<(), SourceError> {
        tokio::fs::write(&self.path, rubric.to_bytes())
            .await
            .map_err(|source| SourceError::Io { path: self.path.clone(), source })
    }
}
