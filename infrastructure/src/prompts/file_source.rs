//! File-backed prompt source.
//!
//! A prompt reference is a file name or path. Absolute paths are read as
//! is; relative ones are looked up in each search directory in order.

use async_trait::async_trait;
use devgate_application::{PromptSource, PromptSourceError};
use devgate_domain::PromptRef;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct FilePromptSource {
    dirs: Vec<PathBuf>,
}

impl FilePromptSource {
    pub fn new(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            dirs: dirs.into_iter().collect(),
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// First existing file for `reference`
    pub fn locate(&self, reference: &PromptRef) -> Option<PathBuf> {
        let path = Path::new(reference.as_str());
        if path.is_absolute() {
            return path.is_file().then(|| path.to_path_buf());
        }
        self.dirs
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.is_file())
    }
}

#[async_trait]
impl PromptSource for FilePromptSource {
    async fn load(&self, reference: &PromptRef) -> Result<String, PromptSourceError> {
        let Some(path) = self.locate(reference) else {
            return Err(PromptSourceError::NotFound(format!(
                "{} (searched {})",
                reference,
                self.dirs
                    .iter()
                    .map(|d| d.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        };
        debug!("Loading role prompt from {}", path.display());
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PromptSourceError::Io {
                reference: reference.to_string(),
                message: e.to_string(),
            })
    }
}
