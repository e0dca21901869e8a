//! Configuration and settings management
//!
//! Loads settings from environment variables and defines relay constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use crate::relay::ChatId;
use std::path::PathBuf;

/// Staging directory used when `DOWNLOAD_DIR` is not set
pub const DEFAULT_DOWNLOAD_DIR: &str = "./downloads";

/// Command sent as a reply to the uploaded photo to wake up the lookup bot
pub const DEFAULT_TRIGGER_COMMAND: &str = "/search";

/// Liveness message sent to the operator after a successful startup
pub const LIVENESS_MESSAGE: &str = "Hello myself!";

/// How long a received photo stays downloadable without refetching its message
pub const MEDIA_CACHE_TTL_SECS: u64 = 600;

/// Upper bound on remembered chats and photos in the transport caches
pub const TRANSPORT_CACHE_CAPACITY: u64 = 10_000;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Base64-encoded MTProto session of an already logged-in user account
    pub string_session: String,

    /// Application ID from my.telegram.org
    pub api_id: i32,

    /// Application hash paired with `api_id`
    pub api_hash: String,

    /// Conversation the photos are picked up from
    pub group_id_target: i64,

    /// Account ID of the automated sender whose photos are relayed
    pub bot_user_id: i64,

    /// Conversation the photos are uploaded into
    pub group_id_mine: i64,

    /// Local staging directory
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Reply text sent under every uploaded photo
    #[serde(default = "default_trigger_command")]
    pub trigger_command: String,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DOWNLOAD_DIR)
}

fn default_trigger_command() -> String {
    DEFAULT_TRIGGER_COMMAND.to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use photo_relay::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a required key is missing or cannot be parsed.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg.. `APP__GROUP_ID_TARGET=-100 ./target/photo-relay`
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Environment::default() maps UPPER_SNAKE_CASE to snake_case;
            // empty vars count as unset so they surface as missing fields
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let settings: Self = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.string_session.trim().is_empty() {
            return Err(ConfigError::Message(
                "Environment variable STRING_SESSION is not set".to_string(),
            ));
        }
        if self.api_id <= 0 || self.api_hash.trim().is_empty() {
            return Err(ConfigError::Message(
                "API_ID and API_HASH must both be set".to_string(),
            ));
        }
        if self.trigger_command.trim().is_empty() {
            return Err(ConfigError::Message(
                "TRIGGER_COMMAND must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Conversation the photos are picked up from
    #[must_use]
    pub const fn target_chat(&self) -> ChatId {
        ChatId(self.group_id_target)
    }

    /// Conversation the photos are uploaded into
    #[must_use]
    pub const fn destination_chat(&self) -> ChatId {
        ChatId(self.group_id_mine)
    }
}
