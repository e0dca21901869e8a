//! Inbound event model
//!
//! A transport-neutral view of a new Telegram message, holding only what the
//! relay needs.

use std::fmt;

/// Conversation identifier in Telegram's marked form
///
/// Users keep their plain ID, basic groups are negated and channels or
/// supergroups carry the `-100` prefix, matching what `GROUP_ID_*` settings
/// hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message identifier within one conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// Where an outgoing text goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    /// The logged-in account's own conversation ("Saved Messages")
    SavedMessages,
    /// Any other conversation
    Chat(ChatId),
}

/// Who sent a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sender {
    /// A user account (bots included)
    User {
        /// Account ID
        id: i64,
    },
    /// A channel or group posting on its own behalf
    Chat {
        /// Marked chat ID
        id: i64,
    },
}

/// Location of a message, usable as a reply anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    /// Conversation the message lives in
    pub chat_id: ChatId,
    /// Message ID within that conversation
    pub message_id: MessageId,
}

/// Downloadable photo reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRef {
    /// Decimal photo ID, used to name the staged file
    pub id: String,
    /// Message the photo is attached to
    pub message: MessageRef,
}

impl fmt::Display for PhotoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Media attached to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPayload {
    /// A photograph; the only kind the relay handles
    Photo(PhotoRef),
    /// Any other media kind, e.g. `"document"` or `"sticker"`
    Other {
        /// Media kind name
        kind: &'static str,
    },
}

impl MediaPayload {
    /// Returns the photo reference when the payload is a photo
    #[must_use]
    pub const fn as_photo(&self) -> Option<&PhotoRef> {
        match self {
            Self::Photo(photo) => Some(photo),
            Self::Other { .. } => None,
        }
    }
}

/// A new message delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Source conversation
    pub chat_id: Option<ChatId>,
    /// Sender identity
    pub sender: Option<Sender>,
    /// Attached media, if any
    pub media: Option<MediaPayload>,
    /// Handle of the message itself
    pub message: MessageRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> MessageRef {
        MessageRef {
            chat_id: ChatId(-1_001_234),
            message_id: MessageId(7),
        }
    }

    #[test]
    fn photo_payload_exposes_reference() {
        let payload = MediaPayload::Photo(PhotoRef {
            id: "5312".to_string(),
            message: message(),
        });

        let photo = payload.as_photo().map(ToString::to_string);
        assert_eq!(photo.as_deref(), Some("5312"));
    }

    #[test]
    fn other_media_is_not_a_photo() {
        assert!(MediaPayload::Other { kind: "document" }.as_photo().is_none());
    }

    #[test]
    fn chat_id_displays_marked_form() {
        assert_eq!(ChatId(-1_001_234).to_string(), "-1001234");
    }
}
