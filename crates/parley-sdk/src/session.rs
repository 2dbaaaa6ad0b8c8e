//! Capabilities supplied by the wrapped messaging SDK
//!
//! The bridge never talks to a native singleton. Each platform implements these
//! traits over its own SDK objects and hands them to the
//! [`LifecycleManager`](crate::LifecycleManager), which owns the one live
//! [`Session`] and enforces when each call is allowed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::events::ConnectionStatus;
use crate::notification::{DisplayRequest, NotificationPayload};

/// Snapshot of the authenticated user returned by a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub external_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionErrorKind {
    /// The SDK refused the input (channel key, token)
    Rejected,
    /// Network or remote configuration failure
    Network,
    /// Nothing to act on, e.g. no active conversation store
    Unavailable,
    Other,
}

/// Failure reported by the underlying SDK
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionError {
    pub kind: SessionErrorKind,
    pub message: String,
}

impl SessionError {
    pub fn new(kind: SessionErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Rejected, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Network, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Unavailable, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Other, message)
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SessionError {}

/// Event as the SDK emits it, before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum SdkEvent {
    UnreadMessageCountChanged { current_unread_count: u32 },
    AuthenticationFailed { error: String },
    FieldValidationFailed { errors: Vec<String> },
    ConnectionStatusChanged { connection_status: ConnectionStatus },
    SendMessageFailed { cause: String },
    ConversationAdded { conversation_id: String },
    /// Anything a newer SDK emits that the bridge does not know about
    Unrecognized { name: String },
}

/// The SDK's own push classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushResponsibility {
    MessagingShouldDisplay,
    MessagingShouldNotDisplay,
    NotFromMessaging,
    /// A classification this bridge does not recognize
    Unrecognized(String),
}

/// Where a presentation request should land
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ViewTarget {
    /// The default messaging screen
    Messaging,
    /// A specific conversation, resolved from a notification tap
    #[serde(rename_all = "camelCase")]
    Conversation { conversation_id: String },
}

/// One live connection to the messaging SDK
#[async_trait]
pub trait Session: Send + Sync {
    async fn login_user(&self, token: &str) -> Result<User, SessionError>;

    async fn logout_user(&self) -> Result<(), SessionError>;

    /// Tear the session down. Called at most once per session.
    fn invalidate(&self);

    /// `None` when the SDK cannot determine a count
    async fn unread_message_count(&self) -> Option<u32>;

    /// New receiver over the SDK event stream
    fn subscribe_events(&self) -> broadcast::Receiver<SdkEvent>;

    /// Messaging screen, if the SDK can build one right now
    fn messaging_target(&self) -> Option<ViewTarget>;

    /// Deep-link target for a tapped notification
    fn resolve_tap(&self, payload: &NotificationPayload) -> Option<ViewTarget>;
}

/// Creates sessions from a channel key; may suspend on network/config fetch
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self, channel_key: &str) -> Result<Arc<dyn Session>, SessionError>;
}

/// Process-wide push primitives of the SDK. Usable before any session exists.
pub trait PushPlatform: Send + Sync {
    fn should_be_displayed(&self, payload: &NotificationPayload) -> PushResponsibility;

    fn display_notification(&self, request: &DisplayRequest) -> Result<(), SessionError>;

    fn update_push_notification_token(&self, token: &[u8]);
}

/// Foreground UI surface able to present a conversation view
pub trait PresentationHost: Send + Sync {
    fn present(&self, target: &ViewTarget) -> Result<(), String>;
}
