use async_trait::async_trait;
use photo_relay::error::TransportError;
use photo_relay::relay::{
    ChatId, ErrorReporter, EventValidator, InboundEvent, LocalStage, MediaPayload, MediaTransfer,
    MessageId, MessageRef, Peer, PhotoRef, RelayHandler, RelayState, RelayTransport, Sender,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TARGET: ChatId = ChatId(-1_001_234);
const DESTINATION: ChatId = ChatId(-1_005_678);
const ME: ChatId = ChatId(42);
const BOT: i64 = 777;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Download { media_id: String, path: PathBuf },
    Upload { chat_id: ChatId, path: PathBuf },
    Reply { to: MessageRef, text: String },
    Text { to: Peer, text: String },
}

/// Records every call and writes real files on download
#[derive(Default)]
struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicI32,
    download_error: Option<&'static str>,
    upload_error: Option<&'static str>,
    download_delay: Option<Duration>,
}

impl RecordingTransport {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: Call) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn sent(&self, chat_id: ChatId) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
        }
    }

    fn reports(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Text {
                    to: Peer::SavedMessages,
                    text,
                } => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl RelayTransport for RecordingTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<InboundEvent>, TransportError> {
        Ok(None)
    }

    async fn send_text(&self, to: Peer, text: &str) -> Result<MessageRef, TransportError> {
        self.record(Call::Text {
            to,
            text: text.to_string(),
        });
        let chat_id = match to {
            Peer::SavedMessages => ME,
            Peer::Chat(chat_id) => chat_id,
        };
        Ok(self.sent(chat_id))
    }

    async fn download_photo(&self, photo: &PhotoRef, dest: &Path) -> Result<(), TransportError> {
        self.record(Call::Download {
            media_id: photo.id.clone(),
            path: dest.to_path_buf(),
        });
        if let Some(err) = self.download_error {
            return Err(TransportError::other(err));
        }
        tokio::fs::write(dest, b"\xFF\xD8\xFF").await?;
        if let Some(delay) = self.download_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn send_file(&self, chat_id: ChatId, path: &Path) -> Result<MessageRef, TransportError> {
        assert!(path.exists(), "upload of a file that was never staged");
        self.record(Call::Upload {
            chat_id,
            path: path.to_path_buf(),
        });
        if let Some(err) = self.upload_error {
            return Err(TransportError::other(err));
        }
        Ok(self.sent(chat_id))
    }

    async fn reply(&self, to: MessageRef, text: &str) -> Result<MessageRef, TransportError> {
        self.record(Call::Reply {
            to,
            text: text.to_string(),
        });
        Ok(self.sent(to.chat_id))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

fn handler(transport: Arc<RecordingTransport>, dir: &Path) -> RelayHandler {
    let transport: Arc<dyn RelayTransport> = transport;
    let reporter = ErrorReporter::new(Arc::clone(&transport));
    let transfer = MediaTransfer::new(transport, reporter.clone(), DESTINATION);
    RelayHandler::new(
        EventValidator::new(TARGET, BOT),
        LocalStage::new(dir),
        transfer,
        reporter,
        "/search",
    )
}

fn event(chat_id: ChatId, media_id: &str) -> InboundEvent {
    let message = MessageRef {
        chat_id,
        message_id: MessageId(10),
    };
    InboundEvent {
        chat_id: Some(chat_id),
        sender: Some(Sender::User { id: BOT }),
        media: Some(MediaPayload::Photo(PhotoRef {
            id: media_id.to_string(),
            message,
        })),
        message,
    }
}

#[tokio::test]
async fn test_healthy_relay_runs_every_step_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let transport = Arc::new(RecordingTransport::default());
    let relay = handler(Arc::clone(&transport), dir.path());

    let state = relay.handle_event(&event(TARGET, "42")).await;

    let path = dir.path().join("photo_42.jpg");
    assert_eq!(state, RelayState::Cleaned);
    assert_eq!(
        transport.calls(),
        vec![
            Call::Download {
                media_id: "42".to_string(),
                path: path.clone(),
            },
            Call::Upload {
                chat_id: DESTINATION,
                path: path.clone(),
            },
            Call::Reply {
                to: MessageRef {
                    chat_id: DESTINATION,
                    message_id: MessageId(1),
                },
                text: "/search".to_string(),
            },
        ]
    );
    assert!(!path.exists());
    Ok(())
}

#[tokio::test]
async fn test_event_from_other_chat_has_no_side_effects() -> Result<(), Box<dyn std::error::Error>>
{
    let dir = tempfile::tempdir()?;
    let transport = Arc::new(RecordingTransport::default());
    let relay = handler(Arc::clone(&transport), dir.path());

    let state = relay.handle_event(&event(ChatId(-1_009_999), "42")).await;

    assert_eq!(state, RelayState::Aborted);
    assert!(transport.calls().is_empty());
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_download_timeout_reports_and_stops() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let transport = Arc::new(RecordingTransport {
        download_error: Some("timeout"),
        ..RecordingTransport::default()
    });
    let relay = handler(Arc::clone(&transport), dir.path());

    let state = relay.handle_event(&event(TARGET, "42")).await;

    assert_eq!(state, RelayState::Aborted);
    let reports = transport.reports();
    let download_reports: Vec<_> = reports
        .iter()
        .filter(|r| r.starts_with("Error: DownloadError\n"))
        .collect();
    assert_eq!(download_reports.len(), 1);
    assert!(download_reports[0].contains("timeout"));
    assert!(!transport
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Upload { .. } | Call::Reply { .. })));
    Ok(())
}

#[tokio::test]
async fn test_upload_failure_reports_twice_and_never_triggers(
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let transport = Arc::new(RecordingTransport {
        upload_error: Some("rpc error 400: PHOTO_INVALID_DIMENSIONS"),
        ..RecordingTransport::default()
    });
    let relay = handler(Arc::clone(&transport), dir.path());

    let state = relay.handle_event(&event(TARGET, "42")).await;

    assert_eq!(state, RelayState::Aborted);
    let reports = transport.reports();
    assert_eq!(
        reports
            .iter()
            .filter(|r| r.starts_with("Error: UploadError\n"))
            .count(),
        1
    );
    assert!(reports
        .iter()
        .any(|r| r.starts_with("Error: GeneralError\n")));
    assert!(!transport
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Reply { .. })));
    assert!(!dir.path().join("photo_42.jpg").exists());
    Ok(())
}

#[tokio::test]
async fn test_same_photo_relays_do_not_overlap() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let transport = Arc::new(RecordingTransport {
        download_delay: Some(Duration::from_millis(50)),
        ..RecordingTransport::default()
    });
    let relay = Arc::new(handler(Arc::clone(&transport), dir.path()));

    let first = {
        let relay = Arc::clone(&relay);
        tokio::spawn(async move { relay.handle_event(&event(TARGET, "7")).await })
    };
    let second = {
        let relay = Arc::clone(&relay);
        tokio::spawn(async move { relay.handle_event(&event(TARGET, "7")).await })
    };

    assert_eq!(first.await?, RelayState::Cleaned);
    assert_eq!(second.await?, RelayState::Cleaned);

    // Each download is followed by its own upload before the next download starts
    let steps: Vec<_> = transport
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Download { .. } | Call::Upload { .. }))
        .collect();
    assert_eq!(steps.len(), 4);
    assert!(matches!(steps[0], Call::Download { .. }));
    assert!(matches!(steps[1], Call::Upload { .. }));
    assert!(matches!(steps[2], Call::Download { .. }));
    assert!(matches!(steps[3], Call::Upload { .. }));
    assert!(transport.reports().is_empty());
    Ok(())
}
