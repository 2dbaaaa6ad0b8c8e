//! Configuration records for FFI

use parley_sdk::config::{
    DEFAULT_BODY_KEY, DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_SIGNATURE_KEYS, DEFAULT_TITLE_KEY,
    DEFAULT_UNREAD_COUNT_TIMEOUT_MS,
};

use crate::error::ParleyFfiError;

/// Push token format of the host transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum PushTokenEncoding {
    /// FCM registration tokens, passed through as-is
    Raw,
    /// APNs device tokens rendered as hex
    Hex,
}

impl From<PushTokenEncoding> for parley_sdk::PushTokenEncoding {
    fn from(encoding: PushTokenEncoding) -> Self {
        match encoding {
            PushTokenEncoding::Raw => parley_sdk::PushTokenEncoding::Raw,
            PushTokenEncoding::Hex => parley_sdk::PushTokenEncoding::Hex,
        }
    }
}

impl From<parley_sdk::PushTokenEncoding> for PushTokenEncoding {
    fn from(encoding: parley_sdk::PushTokenEncoding) -> Self {
        match encoding {
            parley_sdk::PushTokenEncoding::Raw => PushTokenEncoding::Raw,
            parley_sdk::PushTokenEncoding::Hex => PushTokenEncoding::Hex,
        }
    }
}

/// Bridge configuration passed to `ParleyMessaging` constructors
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct MessagingConfig {
    pub signature_keys: Vec<String>,
    pub title_key: String,
    pub body_key: String,
    pub push_token_encoding: PushTokenEncoding,
    pub unread_count_timeout_ms: u64,
    pub event_channel_capacity: u32,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            signature_keys: DEFAULT_SIGNATURE_KEYS.iter().map(|k| k.to_string()).collect(),
            title_key: DEFAULT_TITLE_KEY.to_string(),
            body_key: DEFAULT_BODY_KEY.to_string(),
            push_token_encoding: PushTokenEncoding::Raw,
            unread_count_timeout_ms: DEFAULT_UNREAD_COUNT_TIMEOUT_MS,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY as u32,
        }
    }
}

impl MessagingConfig {
    pub(crate) fn into_core(self) -> Result<parley_sdk::ParleyConfig, ParleyFfiError> {
        let config = parley_sdk::ParleyConfig {
            signature_keys: self.signature_keys,
            title_key: self.title_key,
            body_key: self.body_key,
            push_token_encoding: self.push_token_encoding.into(),
            unread_count_timeout_ms: self.unread_count_timeout_ms,
            event_channel_capacity: self.event_channel_capacity as usize,
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<parley_sdk::ParleyConfig> for MessagingConfig {
    fn from(config: parley_sdk::ParleyConfig) -> Self {
        Self {
            signature_keys: config.signature_keys,
            title_key: config.title_key,
            body_key: config.body_key,
            push_token_encoding: config.push_token_encoding.into(),
            unread_count_timeout_ms: config.unread_count_timeout_ms,
            event_channel_capacity: u32::try_from(config.event_channel_capacity).unwrap_or(u32::MAX),
        }
    }
}

/// Default configuration, for callers that only tweak a field or two
#[uniffi::export]
pub fn default_messaging_config() -> MessagingConfig {
    MessagingConfig::default()
}

/// Parse a JSON configuration document; missing fields take their defaults
#[uniffi::export]
pub fn parse_messaging_config(json: String) -> Result<MessagingConfig, ParleyFfiError> {
    let config = parley_sdk::ParleyConfig::from_json(&json)?;
    Ok(config.into())
}

/// Input of `ParleyMessaging::initialize`
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct InitializeConfig {
    pub channel_key: String,
    #[uniffi(default = false)]
    pub skip_open_messaging: bool,
}

impl From<InitializeConfig> for parley_sdk::InitializeOptions {
    fn from(config: InitializeConfig) -> Self {
        parley_sdk::InitializeOptions::new(config.channel_key).skip_open_messaging(config.skip_open_messaging)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_converts_cleanly() {
        let core = MessagingConfig::default().into_core().unwrap();
        assert_eq!(core, parley_sdk::ParleyConfig::default());
    }

    #[test]
    fn invalid_config_is_a_validation_error() {
        let config = MessagingConfig {
            signature_keys: vec![],
            ..MessagingConfig::default()
        };
        assert_eq!(config.into_core().unwrap_err().code(), "ValidationError");

        let config = MessagingConfig {
            event_channel_capacity: 0,
            ..MessagingConfig::default()
        };
        assert!(config.into_core().is_err());
    }

    #[test]
    fn json_config_round_trips_into_record() {
        let config = parse_messaging_config(r#"{"push_token_encoding":"hex","title_key":"subject"}"#.into()).unwrap();
        assert_eq!(config.push_token_encoding, PushTokenEncoding::Hex);
        assert_eq!(config.title_key, "subject");
        assert_eq!(config.body_key, "body");

        assert!(parse_messaging_config("{".into()).is_err());
    }
}
