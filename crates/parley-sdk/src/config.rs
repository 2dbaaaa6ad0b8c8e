//! Bridge configuration
//!
//! `ParleyConfig` describes what a messaging push looks like and how the bridge
//! talks to the host platform. `InitializeOptions` is the per-call input of
//! [`LifecycleManager::initialize`](crate::LifecycleManager::initialize).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ParleyError, Result};

/// Keys every messaging push carries
pub const DEFAULT_SIGNATURE_KEYS: &[&str] = &["conversation_id", "message_id"];
pub const DEFAULT_TITLE_KEY: &str = "title";
pub const DEFAULT_BODY_KEY: &str = "body";
pub const DEFAULT_UNREAD_COUNT_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// How the host push transport encodes device tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushTokenEncoding {
    /// Token string is passed through as UTF-8 bytes (FCM)
    #[default]
    Raw,
    /// Token string is the hex form of the device token bytes (APNs)
    Hex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    /// Payload keys that must all be present for a push to be messaging-owned
    pub signature_keys: Vec<String>,
    pub title_key: String,
    pub body_key: String,
    pub push_token_encoding: PushTokenEncoding,
    /// Upper bound on a single unread count query
    pub unread_count_timeout_ms: u64,
    /// Capacity of event channels created by session adapters
    pub event_channel_capacity: usize,
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            signature_keys: DEFAULT_SIGNATURE_KEYS.iter().map(|k| k.to_string()).collect(),
            title_key: DEFAULT_TITLE_KEY.to_string(),
            body_key: DEFAULT_BODY_KEY.to_string(),
            push_token_encoding: PushTokenEncoding::default(),
            unread_count_timeout_ms: DEFAULT_UNREAD_COUNT_TIMEOUT_MS,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl ParleyConfig {
    pub fn builder() -> ParleyConfigBuilder {
        ParleyConfigBuilder::default()
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ParleyError::validation("config", &e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.signature_keys.is_empty() {
            return Err(ParleyError::validation("signature_keys", "at least one key is required"));
        }
        if self.signature_keys.iter().any(|k| k.trim().is_empty()) {
            return Err(ParleyError::validation("signature_keys", "keys must not be empty"));
        }
        if self.unread_count_timeout_ms == 0 {
            return Err(ParleyError::validation("unread_count_timeout_ms", "must be positive"));
        }
        if self.event_channel_capacity == 0 {
            return Err(ParleyError::validation("event_channel_capacity", "must be positive"));
        }
        Ok(())
    }

    pub fn unread_count_timeout(&self) -> Duration {
        Duration::from_millis(self.unread_count_timeout_ms)
    }
}

#[derive(Debug, Default)]
pub struct ParleyConfigBuilder {
    config: ParleyConfig,
}

impl ParleyConfigBuilder {
    pub fn signature_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.signature_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn title_key(mut self, key: impl Into<String>) -> Self {
        self.config.title_key = key.into();
        self
    }

    pub fn body_key(mut self, key: impl Into<String>) -> Self {
        self.config.body_key = key.into();
        self
    }

    pub fn push_token_encoding(mut self, encoding: PushTokenEncoding) -> Self {
        self.config.push_token_encoding = encoding;
        self
    }

    pub fn unread_count_timeout(mut self, timeout: Duration) -> Self {
        self.config.unread_count_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<ParleyConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Input of `initialize`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeOptions {
    pub channel_key: String,
    /// When false, the messaging view is opened once the session is ready
    #[serde(default)]
    pub skip_open_messaging: bool,
}

impl InitializeOptions {
    pub fn new(channel_key: impl Into<String>) -> Self {
        Self {
            channel_key: channel_key.into(),
            skip_open_messaging: false,
        }
    }

    pub fn skip_open_messaging(mut self, skip: bool) -> Self {
        self.skip_open_messaging = skip;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ParleyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.signature_keys, vec!["conversation_id", "message_id"]);
        assert_eq!(config.unread_count_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn json_fills_missing_fields() {
        let config = ParleyConfig::from_json(r#"{"push_token_encoding":"hex"}"#).unwrap();
        assert_eq!(config.push_token_encoding, PushTokenEncoding::Hex);
        assert_eq!(config.title_key, "title");
    }

    #[test]
    fn empty_signature_is_rejected() {
        let err = ParleyConfig::builder()
            .signature_keys(Vec::<String>::new())
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "ValidationError");

        assert!(ParleyConfig::from_json(r#"{"signature_keys":[""]}"#).is_err());
        assert!(ParleyConfig::from_json("not json").is_err());
    }

    #[test]
    fn unread_count_timeout_must_be_positive() {
        let err = ParleyConfig::builder()
            .unread_count_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(err, ParleyError::validation("unread_count_timeout_ms", "must be positive"));
        assert!(ParleyConfig::from_json(r#"{"unread_count_timeout_ms":0}"#).is_err());

        let config = ParleyConfig::builder()
            .unread_count_timeout(Duration::MAX)
            .build()
            .unwrap();
        assert_eq!(config.unread_count_timeout_ms, u64::MAX);
    }

    #[test]
    fn initialize_options_default_to_opening_messaging() {
        let options: InitializeOptions = serde_json::from_str(r#"{"channelKey":"abc"}"#).unwrap();
        assert_eq!(options, InitializeOptions::new("abc"));
        assert!(!options.skip_open_messaging);
    }
}
