//! Operator notifications for classified failures

use super::event::Peer;
use super::transport::RelayTransport;
use crate::error::ClassifiedError;
use std::sync::Arc;
use tracing::{error, warn};

/// Delivers classified failures to the logged-in account's own conversation
///
/// Reporting never fails: if the notice cannot be sent, the failure is logged
/// and dropped so the original error is not masked.
#[derive(Clone)]
pub struct ErrorReporter {
    transport: Arc<dyn RelayTransport>,
}

impl ErrorReporter {
    /// Create a reporter sending through `transport`
    #[must_use]
    pub fn new(transport: Arc<dyn RelayTransport>) -> Self {
        Self { transport }
    }

    /// Send the two-line notice for `err` to the operator
    pub async fn report(&self, err: ClassifiedError) {
        warn!(kind = %err.kind, message = %err.message, "Reporting relay failure");

        if let Err(send_err) = self
            .transport
            .send_text(Peer::SavedMessages, &err.notice())
            .await
        {
            error!(
                kind = %err.kind,
                error = %send_err,
                "Failed to send error message"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, TransportError};
    use crate::relay::event::{ChatId, MessageId, MessageRef};
    use crate::relay::transport::MockRelayTransport;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn report_sends_notice_to_saved_messages() {
        let mut transport = MockRelayTransport::new();
        transport
            .expect_send_text()
            .with(
                eq(Peer::SavedMessages),
                eq("Error: UploadError\nMessage: Error uploading media: boom"),
            )
            .times(1)
            .returning(|_, _| {
                Ok(MessageRef {
                    chat_id: ChatId(42),
                    message_id: MessageId(1),
                })
            });

        let reporter = ErrorReporter::new(Arc::new(transport));
        reporter
            .report(ClassifiedError::upload(&TransportError::other("boom")))
            .await;
    }

    #[tokio::test]
    async fn send_failure_is_swallowed() {
        let mut transport = MockRelayTransport::new();
        transport
            .expect_send_text()
            .times(1)
            .returning(|_, _| Err(TransportError::NotConnected));

        let reporter = ErrorReporter::new(Arc::new(transport));
        reporter
            .report(ClassifiedError::new(ErrorKind::General, "anything"))
            .await;
    }
}
