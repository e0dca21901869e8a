//! Local staging of downloaded photos
//!
//! Every relay owns one file in the staging directory for its lifetime. The
//! file name is derived from the photo ID alone.

use super::reporter::ErrorReporter;
use crate::error::{ClassifiedError, TransportError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Staging directory for photos in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStage {
    dir: PathBuf,
}

impl LocalStage {
    /// Create a stage rooted at `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Staging directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the staging directory if it does not exist yet
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created for any reason
    /// other than already existing.
    pub async fn ensure_staging_directory(&self) -> Result<(), TransportError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        info!(dir = %self.dir.display(), "Staging directory ready");
        Ok(())
    }

    /// Path of the staged file for a photo: `<dir>/photo_<id>.jpg`
    #[must_use]
    pub fn path_for(&self, media_id: &str) -> PathBuf {
        self.dir.join(format!("photo_{media_id}.jpg"))
    }

    /// Remove a staged file, reporting but never propagating a failure
    pub async fn delete_file(&self, path: &Path, reporter: &ErrorReporter) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Staged file removed"),
            Err(e) => {
                reporter
                    .report(ClassifiedError::file_delete(&TransportError::from(e)))
                    .await;
            }
        }
    }
}
