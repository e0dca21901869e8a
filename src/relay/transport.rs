//! Remote transport boundary
//!
//! [`RelayTransport`] is everything the relay asks of Telegram.
//! [`TelegramTransport`] implements it over MTProto as a logged-in user
//! account, which unlike a Bot API bot also sees messages posted by bots.

use super::event::{
    ChatId, InboundEvent, MediaPayload, MessageId, MessageRef, Peer, PhotoRef, Sender,
};
use crate::config::{Settings, MEDIA_CACHE_TTL_SECS, TRANSPORT_CACHE_CAPACITY};
use crate::error::TransportError;
use async_trait::async_trait;
use base64::Engine as _;
use grammers_client::types::{Chat, Downloadable, Media, Message};
use grammers_client::{Client, Config, InitParams, InputMessage, Update};
use grammers_session::{PackedChat, PackedType, Session};
use moka::future::Cache;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Offset Telegram folds into the marked ID of channels and supergroups
const CHANNEL_ID_OFFSET: i64 = 1_000_000_000_000;

/// Operations the relay needs from the remote messaging service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Authenticate and verify the session is usable
    async fn connect(&self) -> Result<(), TransportError>;

    /// Wait for the next new message
    ///
    /// Returns `Ok(None)` once the transport has been disconnected.
    async fn next_event(&self) -> Result<Option<InboundEvent>, TransportError>;

    /// Send a plain text message
    async fn send_text(&self, to: Peer, text: &str) -> Result<MessageRef, TransportError>;

    /// Materialize the photo bytes at `dest`
    async fn download_photo(&self, photo: &PhotoRef, dest: &Path) -> Result<(), TransportError>;

    /// Upload the file at `path` to `chat_id` as a photo
    async fn send_file(&self, chat_id: ChatId, path: &Path) -> Result<MessageRef, TransportError>;

    /// Send `text` as a reply to `to`
    async fn reply(&self, to: MessageRef, text: &str) -> Result<MessageRef, TransportError>;

    /// Close the connection
    async fn disconnect(&self) -> Result<(), TransportError>;
}

struct Connection {
    client: Client,
    me: PackedChat,
}

/// MTProto user-session transport
pub struct TelegramTransport {
    string_session: String,
    api_id: i32,
    api_hash: String,
    connection: RwLock<Option<Connection>>,
    /// marked chat ID -> access hash bundle needed to address the chat
    chats: Cache<i64, PackedChat>,
    /// Photos seen in recent updates, so downloads skip a refetch
    media: Cache<MessageRef, Media>,
}

impl TelegramTransport {
    /// Create a disconnected transport for the configured account
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            string_session: settings.string_session.clone(),
            api_id: settings.api_id,
            api_hash: settings.api_hash.clone(),
            connection: RwLock::new(None),
            chats: Cache::new(TRANSPORT_CACHE_CAPACITY),
            media: Cache::builder()
                .max_capacity(TRANSPORT_CACHE_CAPACITY)
                .time_to_live(Duration::from_secs(MEDIA_CACHE_TTL_SECS))
                .build(),
        }
    }

    fn session(&self) -> Result<Session, TransportError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(self.string_session.trim())
            .map_err(|e| TransportError::other(format!("Invalid STRING_SESSION: {e}")))?;
        Session::load(&bytes)
            .map_err(|e| TransportError::other(format!("Invalid STRING_SESSION: {e}")))
    }

    fn client(&self) -> Result<(Client, PackedChat), TransportError> {
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|conn| (conn.client.clone(), conn.me))
            .ok_or(TransportError::NotConnected)
    }

    async fn remember(&self, chat: &Chat) -> ChatId {
        let packed = chat.pack();
        let id = marked_id(&packed);
        self.chats.insert(id.0, packed).await;
        id
    }

    async fn resolve(&self, chat_id: ChatId) -> Result<PackedChat, TransportError> {
        self.chats.get(&chat_id.0).await.ok_or_else(|| {
            TransportError::other(format!("Chat {chat_id} is not among this account's dialogs"))
        })
    }

    async fn ingest(&self, message: &Message) -> InboundEvent {
        let chat_id = self.remember(&message.chat()).await;
        let reference = MessageRef {
            chat_id,
            message_id: MessageId(message.id()),
        };

        let sender = match message.sender() {
            Some(chat) => {
                self.remember(&chat).await;
                Some(sender_of(&chat))
            }
            None => None,
        };

        let media = match message.media() {
            Some(Media::Photo(photo)) => {
                let id = photo.id().to_string();
                self.media
                    .insert(reference, Media::Photo(photo))
                    .await;
                Some(MediaPayload::Photo(PhotoRef {
                    id,
                    message: reference,
                }))
            }
            Some(other) => Some(MediaPayload::Other {
                kind: media_kind(&other),
            }),
            None => None,
        };

        InboundEvent {
            chat_id: Some(chat_id),
            sender,
            media,
            message: reference,
        }
    }

    async fn refetch(&self, client: &Client, photo: &PhotoRef) -> Result<Media, TransportError> {
        let chat = self.resolve(photo.message.chat_id).await?;
        let messages = client
            .get_messages_by_id(chat, &[photo.message.message_id.0])
            .await
            .map_err(TransportError::remote)?;

        messages
            .into_iter()
            .flatten()
            .find_map(|message| message.media())
            .ok_or_else(|| TransportError::other(format!("Photo {photo} is no longer available")))
    }
}

/// Telegram's marked form of a chat ID, as used in `GROUP_ID_*` settings
fn marked_id(chat: &PackedChat) -> ChatId {
    match chat.ty {
        PackedType::User | PackedType::Bot => ChatId(chat.id),
        PackedType::Chat => ChatId(-chat.id),
        _ => ChatId(-(CHANNEL_ID_OFFSET + chat.id)),
    }
}

fn sender_of(chat: &Chat) -> Sender {
    match chat {
        Chat::User(user) => Sender::User { id: user.id() },
        _ => Sender::Chat {
            id: marked_id(&chat.pack()).0,
        },
    }
}

fn media_kind(media: &Media) -> &'static str {
    match media {
        Media::Photo(_) => "photo",
        Media::Document(_) => "document",
        Media::Sticker(_) => "sticker",
        Media::Contact(_) => "contact",
        Media::Poll(_) => "poll",
        _ => "other",
    }
}

fn message_ref(chat: &PackedChat, sent: &Message) -> MessageRef {
    MessageRef {
        chat_id: marked_id(chat),
        message_id: MessageId(sent.id()),
    }
}

/// Run `download` into `dest`, removing whatever it left there if it fails
///
/// # Errors
///
/// Returns the download error after the partial file is gone.
pub async fn stage_download<F, E>(dest: &Path, download: F) -> Result<(), TransportError>
where
    F: Future<Output = Result<(), E>>,
    E: fmt::Display,
{
    let Err(e) = download.await else {
        return Ok(());
    };

    match tokio::fs::remove_file(dest).await {
        Ok(()) => debug!(path = %dest.display(), "Partial download removed"),
        Err(rm) if rm.kind() == std::io::ErrorKind::NotFound => {}
        Err(rm) => {
            warn!(path = %dest.display(), error = %rm, "Failed to remove partial download");
        }
    }
    Err(TransportError::remote(e))
}

#[async_trait]
impl RelayTransport for TelegramTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let client = Client::connect(Config {
            session: self.session()?,
            api_id: self.api_id,
            api_hash: self.api_hash.clone(),
            params: InitParams {
                catch_up: false,
                ..InitParams::default()
            },
        })
        .await
        .map_err(TransportError::remote)?;

        if !client.is_authorized().await.map_err(TransportError::remote)? {
            return Err(TransportError::other("STRING_SESSION is not logged in"));
        }

        let me = client.get_me().await.map_err(TransportError::remote)?;
        info!(user_id = me.id(), username = ?me.username(), "Connected");

        // Configured chat IDs carry no access hash; learn them from the dialog list
        let mut dialogs = client.iter_dialogs();
        while let Some(dialog) = dialogs.next().await.map_err(TransportError::remote)? {
            self.remember(dialog.chat()).await;
        }
        debug!(chats = self.chats.entry_count(), "Dialogs indexed");

        *self
            .connection
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Connection {
            client,
            me: me.pack(),
        });
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<InboundEvent>, TransportError> {
        let Ok((client, _)) = self.client() else {
            return Ok(None);
        };

        loop {
            if let Update::NewMessage(message) =
                client.next_update().await.map_err(TransportError::remote)?
            {
                return Ok(Some(self.ingest(&message).await));
            }
        }
    }

    async fn send_text(&self, to: Peer, text: &str) -> Result<MessageRef, TransportError> {
        let (client, me) = self.client()?;
        let chat = match to {
            Peer::SavedMessages => me,
            Peer::Chat(chat_id) => self.resolve(chat_id).await?,
        };

        let sent = client
            .send_message(chat, text)
            .await
            .map_err(TransportError::remote)?;
        Ok(message_ref(&chat, &sent))
    }

    async fn download_photo(&self, photo: &PhotoRef, dest: &Path) -> Result<(), TransportError> {
        let (client, _) = self.client()?;
        let media = match self.media.get(&photo.message).await {
            Some(media) => media,
            None => self.refetch(&client, photo).await?,
        };

        let downloadable = Downloadable::Media(media);
        stage_download(dest, client.download_media(&downloadable, dest)).await?;
        debug!(media_id = %photo, path = %dest.display(), "Photo file written");
        Ok(())
    }

    async fn send_file(&self, chat_id: ChatId, path: &Path) -> Result<MessageRef, TransportError> {
        let (client, _) = self.client()?;
        let chat = self.resolve(chat_id).await?;

        let uploaded = client
            .upload_file(path)
            .await
            .map_err(TransportError::remote)?;
        let sent = client
            .send_message(chat, InputMessage::text("").photo(uploaded))
            .await
            .map_err(TransportError::remote)?;
        Ok(message_ref(&chat, &sent))
    }

    async fn reply(&self, to: MessageRef, text: &str) -> Result<MessageRef, TransportError> {
        let (client, _) = self.client()?;
        let chat = self.resolve(to.chat_id).await?;

        let sent = client
            .send_message(chat, InputMessage::text(text).reply_to(Some(to.message_id.0)))
            .await
            .map_err(TransportError::remote)?;
        Ok(message_ref(&chat, &sent))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let connection = self
            .connection
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        // Dropping the last client handle closes the MTProto connection
        match connection {
            Some(conn) => {
                drop(conn);
                info!("Disconnected");
                Ok(())
            }
            None => Err(TransportError::NotConnected),
        }
    }
}
