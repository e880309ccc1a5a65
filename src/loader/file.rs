//! File-backed rule source

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::trace;

use super::RuleLoader;
use crate::error::LoaderError;

/// Reads the full contents of a rule file on every load
///
/// The file is re-read each cycle, so edits are picked up on the next
/// reload without any file watching.
#[derive(Debug, Clone)]
pub struct FileLoader {
    path: PathBuf,
}

impl FileLoader {
    /// Create a loader for `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the rule file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RuleLoader for FileLoader {
    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn load(&self) -> Result<Bytes, LoaderError> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| LoaderError::io(self.path.display().to_string(), e))?;
        trace!(path = %self.path.display(), bytes = data.len(), "Rule file read");
        Ok(Bytes::from(data))
    }
}
