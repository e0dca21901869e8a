//! Download and upload steps of a relay
//!
//! Each step reports its own failure class before handing the raw error back,
//! so the operator can tell which half of the pipeline broke.

use super::event::{ChatId, MessageRef, PhotoRef};
use super::reporter::ErrorReporter;
use super::transport::RelayTransport;
use crate::error::{ClassifiedError, TransportError};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Moves photo bytes between Telegram and the local stage
#[derive(Clone)]
pub struct MediaTransfer {
    transport: Arc<dyn RelayTransport>,
    reporter: ErrorReporter,
    destination: ChatId,
}

impl MediaTransfer {
    /// Create a transfer uploading into `destination`
    #[must_use]
    pub fn new(
        transport: Arc<dyn RelayTransport>,
        reporter: ErrorReporter,
        destination: ChatId,
    ) -> Self {
        Self {
            transport,
            reporter,
            destination,
        }
    }

    /// Download `photo` to `path`
    ///
    /// # Errors
    ///
    /// Reports a `DownloadError` notice, then returns the transport error.
    pub async fn download_media(&self, photo: &PhotoRef, path: &Path) -> Result<(), TransportError> {
        if let Err(e) = self.transport.download_photo(photo, path).await {
            self.reporter.report(ClassifiedError::download(&e)).await;
            return Err(e);
        }
        info!(media_id = %photo, path = %path.display(), "Photo downloaded");
        Ok(())
    }

    /// Upload the file at `path` to the destination conversation
    ///
    /// # Errors
    ///
    /// Reports an `UploadError` notice, then returns the transport error.
    pub async fn upload_file(&self, path: &Path) -> Result<MessageRef, TransportError> {
        match self.transport.send_file(self.destination, path).await {
            Ok(uploaded) => {
                info!(
                    chat_id = uploaded.chat_id.0,
                    message_id = uploaded.message_id.0,
                    "Photo uploaded"
                );
                Ok(uploaded)
            }
            Err(e) => {
                self.reporter.report(ClassifiedError::upload(&e)).await;
                Err(e)
            }
        }
    }

    /// Reply to the uploaded photo with `command`
    ///
    /// # Errors
    ///
    /// Returns the transport error unclassified; the handler reports it.
    pub async fn trigger_remote_command(
        &self,
        uploaded: MessageRef,
        command: &str,
    ) -> Result<(), TransportError> {
        self.transport.reply(uploaded, command).await?;
        info!(command, "Lookup triggered");
        Ok(())
    }
}
