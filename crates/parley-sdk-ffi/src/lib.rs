//! Parley FFI - Foreign Function Interface for the Parley messaging bridge
//!
//! Generates Kotlin (Android) and Swift (iOS) bindings with UniFFI.
//!
//! # Architecture
//!
//! - [`ParleyMessaging`] is the single object apps talk to; its async methods
//!   run on the tokio runtime and reject with [`ParleyFfiError`]
//! - the native messaging SDK is plugged in through callback interfaces
//!   ([`NativeMessagingSdk`], [`NativeSession`], [`NativePushPlatform`],
//!   [`NativePresentationHost`])
//! - native success/failure handlers settle completion objects exactly once

#![allow(clippy::new_without_default)]

mod config;
mod error;
mod events;
mod helpers;
mod native;
mod sdk;


pub use config::{default_messaging_config, parse_messaging_config, InitializeConfig, MessagingConfig, PushTokenEncoding};
pub use error::ParleyFfiError;
pub use events::{
    event_type_name, responsibility_name, ConnectionStatus, EventType, LifecycleState, MessagingEvent,
    MessagingEventListener, MessagingUser, NativeSdkEvent, NotificationResponsibility, Subscription,
};
pub use native::{
    EventSink, InitCompletion, LoginCompletion, NativeError, NativeErrorKind, NativeMessagingSdk, NativePresentationHost,
    NativePushPlatform, NativeSession, NotificationDisplay, PresentationTarget, UnitCompletion,
};
pub use sdk::ParleyMessaging;

// Setup UniFFI scaffolding for proc-macro mode
uniffi::setup_scaffolding!();

/// Bridge version string, from the core crate's Cargo.toml
#[uniffi::export]
pub fn sdk_version() -> String {
    parley_sdk::version::SDK_VERSION.to_string()
}

/// Install a fmt subscriber, e.g. `init_logging("debug")` or `"parley_sdk=trace"`
///
/// Calling it again after a subscriber is installed is a no-op.
#[uniffi::export]
pub fn init_logging(level: String) -> Result<(), ParleyFfiError> {
    let filter = tracing_subscriber::EnvFilter::try_new(level.trim())
        .map_err(|e| ParleyFfiError::invalid_parameter("level", &e.to_string()))?;

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_err()
    {
        tracing::debug!("Logging already initialized, keeping the existing subscriber");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdk_version() {
        let version = sdk_version();
        assert!(!version.is_empty());
        assert!(version.chars().next().unwrap().is_ascii_digit());
    }

    #[test]
    fn init_logging_is_repeatable() {
        init_logging("info".into()).unwrap();
        init_logging("parley_sdk=debug".into()).unwrap();
        assert_eq!(
            init_logging("parley_sdk=loud".into()).unwrap_err().code(),
            "ValidationError"
        );
    }
}
