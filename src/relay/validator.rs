//! Event filtering
//!
//! The update loop hands every new message to the relay; only photos posted by
//! the configured feed bot in the configured conversation are worth relaying.

use super::event::{ChatId, InboundEvent, Sender};
use crate::config::Settings;

/// Decides whether an event should be relayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventValidator {
    target_chat: ChatId,
    bot_user_id: i64,
}

impl EventValidator {
    /// Create a validator for a source conversation and sender account
    #[must_use]
    pub const fn new(target_chat: ChatId, bot_user_id: i64) -> Self {
        Self {
            target_chat,
            bot_user_id,
        }
    }

    /// Create a validator from loaded settings
    #[must_use]
    pub const fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.target_chat(), settings.bot_user_id)
    }

    /// Returns `true` iff the event comes from the target conversation and
    /// was sent by the configured user account. Missing fields never match.
    #[must_use]
    pub fn is_relay_candidate(&self, event: &InboundEvent) -> bool {
        event.chat_id == Some(self.target_chat)
            && matches!(event.sender, Some(Sender::User { id }) if id == self.bot_user_id)
    }
}
