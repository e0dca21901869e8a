//! Per-event relay handler
//!
//! Drives one inbound message through
//! validate -> download -> upload -> trigger -> cleanup.
//! Every failure is reported to the operator and ends the relay; nothing is
//! retried.

use super::event::InboundEvent;
use super::locks::MediaLocks;
use super::reporter::ErrorReporter;
use super::stage::LocalStage;
use super::transfer::MediaTransfer;
use super::transport::RelayTransport;
use super::validator::EventValidator;
use crate::config::Settings;
use crate::error::{ClassifiedError, TransportError};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Progress of a single relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Event delivered by the transport
    Received,
    /// Event passed filtering and carries a photo
    Validated,
    /// Photo staged locally
    Downloaded,
    /// Photo posted to the destination conversation
    Uploaded,
    /// Lookup command sent under the uploaded photo
    Triggered,
    /// Staged file removal attempted (terminal)
    Cleaned,
    /// Relay ended early, filtered out or failed (terminal)
    Aborted,
}

impl RelayState {
    /// Whether the relay has finished
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cleaned | Self::Aborted)
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Relay orchestrator shared by all event invocations
#[derive(Clone)]
pub struct RelayHandler {
    validator: EventValidator,
    stage: LocalStage,
    transfer: MediaTransfer,
    reporter: ErrorReporter,
    locks: MediaLocks,
    trigger_command: String,
}

impl RelayHandler {
    /// Assemble a handler from its parts
    #[must_use]
    pub fn new(
        validator: EventValidator,
        stage: LocalStage,
        transfer: MediaTransfer,
        reporter: ErrorReporter,
        trigger_command: impl Into<String>,
    ) -> Self {
        Self {
            validator,
            stage,
            transfer,
            reporter,
            locks: MediaLocks::default(),
            trigger_command: trigger_command.into(),
        }
    }

    /// Wire a handler to `transport` using the loaded settings
    #[must_use]
    pub fn from_settings(transport: Arc<dyn RelayTransport>, settings: &Settings) -> Self {
        let reporter = ErrorReporter::new(Arc::clone(&transport));
        let transfer = MediaTransfer::new(
            transport,
            reporter.clone(),
            settings.destination_chat(),
        );

        Self::new(
            EventValidator::from_settings(settings),
            LocalStage::new(settings.download_dir.clone()),
            transfer,
            reporter,
            settings.trigger_command.clone(),
        )
    }

    /// Staging area used by this handler
    #[must_use]
    pub const fn stage(&self) -> &LocalStage {
        &self.stage
    }

    /// Reporter used by this handler
    #[must_use]
    pub const fn reporter(&self) -> &ErrorReporter {
        &self.reporter
    }

    /// Run one event to a terminal state
    ///
    /// Never fails: errors escaping the pipeline are reported as
    /// `GeneralError` on top of any step-specific report already sent.
    pub async fn handle_event(&self, event: &InboundEvent) -> RelayState {
        let mut state = RelayState::Received;

        match self.relay(event, &mut state).await {
            Ok(()) if state.is_terminal() => state,
            Ok(()) => RelayState::Aborted,
            Err(e) => {
                warn!(
                    chat_id = event.message.chat_id.0,
                    message_id = event.message.message_id.0,
                    %state,
                    error = %e,
                    "Relay aborted"
                );
                self.reporter.report(ClassifiedError::handler(&e)).await;
                RelayState::Aborted
            }
        }
    }

    async fn relay(
        &self,
        event: &InboundEvent,
        state: &mut RelayState,
    ) -> Result<(), TransportError> {
        if !self.validator.is_relay_candidate(event) {
            *state = RelayState::Aborted;
            return Ok(());
        }

        let Some(photo) = event.media.as_ref().and_then(|media| media.as_photo()) else {
            debug!(
                message_id = event.message.message_id.0,
                "Candidate message carries no photo"
            );
            *state = RelayState::Aborted;
            return Ok(());
        };
        *state = RelayState::Validated;

        let _guard = self.locks.acquire(&photo.id).await;
        let path = self.stage.path_for(&photo.id);

        self.transfer.download_media(photo, &path).await?;
        *state = RelayState::Downloaded;

        // The staged file exists from here on and is removed whatever happens next
        let forwarded = self.forward(&path, state).await;
        self.stage.delete_file(&path, &self.reporter).await;
        forwarded?;
        *state = RelayState::Cleaned;

        info!(media_id = %photo, "Relay complete");
        Ok(())
    }

    async fn forward(&self, path: &Path, state: &mut RelayState) -> Result<(), TransportError> {
        let uploaded = self.transfer.upload_file(path).await?;
        *state = RelayState::Uploaded;

        self.transfer
            .trigger_remote_command(uploaded, &self.trigger_command)
            .await?;
        *state = RelayState::Triggered;
        Ok(())
    }
}
