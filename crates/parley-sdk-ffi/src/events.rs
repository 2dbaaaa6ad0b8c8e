//! Event system and shared data types for FFI callbacks

// ============================================================================
// Callback Interface
// ============================================================================

/// Receives events of the type it was registered for
///
/// Implement this in the UI layer. Called from a background thread, never from
/// the SDK's own delivery thread.
#[uniffi::export(callback_interface)]
pub trait MessagingEventListener: Send + Sync {
    fn on_event(&self, event: MessagingEvent);
}

// ============================================================================
// Event Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    ConnectedRealtime,
}

impl From<parley_sdk::ConnectionStatus> for ConnectionStatus {
    fn from(status: parley_sdk::ConnectionStatus) -> Self {
        match status {
            parley_sdk::ConnectionStatus::Disconnected => Self::Disconnected,
            parley_sdk::ConnectionStatus::Connecting => Self::Connecting,
            parley_sdk::ConnectionStatus::Connected => Self::Connected,
            parley_sdk::ConnectionStatus::ConnectedRealtime => Self::ConnectedRealtime,
        }
    }
}

impl From<ConnectionStatus> for parley_sdk::ConnectionStatus {
    fn from(status: ConnectionStatus) -> Self {
        match status {
            ConnectionStatus::Disconnected => Self::Disconnected,
            ConnectionStatus::Connecting => Self::Connecting,
            ConnectionStatus::Connected => Self::Connected,
            ConnectionStatus::ConnectedRealtime => Self::ConnectedRealtime,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, uniffi::Enum)]
pub enum EventType {
    UnreadMessageCountChanged,
    AuthenticationFailed,
    FieldValidationFailed,
    ConnectionStatusChanged,
    SendMessageFailed,
    ConversationAdded,
}

impl From<EventType> for parley_sdk::EventType {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::UnreadMessageCountChanged => Self::UnreadMessageCountChanged,
            EventType::AuthenticationFailed => Self::AuthenticationFailed,
            EventType::FieldValidationFailed => Self::FieldValidationFailed,
            EventType::ConnectionStatusChanged => Self::ConnectionStatusChanged,
            EventType::SendMessageFailed => Self::SendMessageFailed,
            EventType::ConversationAdded => Self::ConversationAdded,
        }
    }
}

impl From<parley_sdk::EventType> for EventType {
    fn from(event_type: parley_sdk::EventType) -> Self {
        match event_type {
            parley_sdk::EventType::UnreadMessageCountChanged => Self::UnreadMessageCountChanged,
            parley_sdk::EventType::AuthenticationFailed => Self::AuthenticationFailed,
            parley_sdk::EventType::FieldValidationFailed => Self::FieldValidationFailed,
            parley_sdk::EventType::ConnectionStatusChanged => Self::ConnectionStatusChanged,
            parley_sdk::EventType::SendMessageFailed => Self::SendMessageFailed,
            parley_sdk::EventType::ConversationAdded => Self::ConversationAdded,
        }
    }
}

/// Wire name of an event type, e.g. `unreadMessageCountChanged`
#[uniffi::export]
pub fn event_type_name(event_type: EventType) -> String {
    parley_sdk::EventType::from(event_type).as_str().to_string()
}

/// Normalized event delivered to listeners
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum MessagingEvent {
    UnreadMessageCountChanged { unread_count: u32 },
    AuthenticationFailed { reason: String },
    FieldValidationFailed { errors: Vec<String> },
    ConnectionStatusChanged { connection_status: ConnectionStatus },
    SendMessageFailed { cause: String },
    ConversationAdded { conversation_id: String },
}

impl From<parley_sdk::MessagingEvent> for MessagingEvent {
    fn from(event: parley_sdk::MessagingEvent) -> Self {
        use parley_sdk::MessagingEvent as Core;
        match event {
            Core::UnreadMessageCountChanged { unread_count } => Self::UnreadMessageCountChanged { unread_count },
            Core::AuthenticationFailed { reason } => Self::AuthenticationFailed { reason },
            Core::FieldValidationFailed { errors } => Self::FieldValidationFailed { errors },
            Core::ConnectionStatusChanged { connection_status } => Self::ConnectionStatusChanged {
                connection_status: connection_status.into(),
            },
            Core::SendMessageFailed { cause } => Self::SendMessageFailed { cause },
            Core::ConversationAdded { conversation_id } => Self::ConversationAdded { conversation_id },
        }
    }
}

/// Event as the native SDK reports it, pushed through an `EventSink`
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum NativeSdkEvent {
    UnreadMessageCountChanged { current_unread_count: u32 },
    AuthenticationFailed { error: String },
    FieldValidationFailed { errors: Vec<String> },
    ConnectionStatusChanged { connection_status: ConnectionStatus },
    SendMessageFailed { cause: String },
    ConversationAdded { conversation_id: String },
    /// Any SDK event without a counterpart above
    Other { name: String },
}

impl From<NativeSdkEvent> for parley_sdk::SdkEvent {
    fn from(event: NativeSdkEvent) -> Self {
        match event {
            NativeSdkEvent::UnreadMessageCountChanged { current_unread_count } => {
                Self::UnreadMessageCountChanged { current_unread_count }
            }
            NativeSdkEvent::AuthenticationFailed { error } => Self::AuthenticationFailed { error },
            NativeSdkEvent::FieldValidationFailed { errors } => Self::FieldValidationFailed { errors },
            NativeSdkEvent::ConnectionStatusChanged { connection_status } => Self::ConnectionStatusChanged {
                connection_status: connection_status.into(),
            },
            NativeSdkEvent::SendMessageFailed { cause } => Self::SendMessageFailed { cause },
            NativeSdkEvent::ConversationAdded { conversation_id } => Self::ConversationAdded { conversation_id },
            NativeSdkEvent::Other { name } => Self::Unrecognized { name },
        }
    }
}

// ============================================================================
// Lifecycle & push types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
    Resetting,
}

impl From<parley_sdk::LifecycleState> for LifecycleState {
    fn from(state: parley_sdk::LifecycleState) -> Self {
        match state {
            parley_sdk::LifecycleState::Uninitialized => Self::Uninitialized,
            parley_sdk::LifecycleState::Initializing => Self::Initializing,
            parley_sdk::LifecycleState::Ready => Self::Ready,
            parley_sdk::LifecycleState::Resetting => Self::Resetting,
        }
    }
}

/// Authenticated user snapshot
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct MessagingUser {
    pub id: String,
    pub external_id: String,
}

impl From<parley_sdk::User> for MessagingUser {
    fn from(user: parley_sdk::User) -> Self {
        Self {
            id: user.id,
            external_id: user.external_id,
        }
    }
}

impl From<MessagingUser> for parley_sdk::User {
    fn from(user: MessagingUser) -> Self {
        Self {
            id: user.id,
            external_id: user.external_id,
        }
    }
}

/// Verdict of `handle_notification`
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum NotificationResponsibility {
    MessagingShouldDisplay,
    MessagingShouldNotDisplay,
    NotFromMessaging,
    Unknown,
}

impl From<parley_sdk::ResponsibilityVerdict> for NotificationResponsibility {
    fn from(verdict: parley_sdk::ResponsibilityVerdict) -> Self {
        use parley_sdk::ResponsibilityVerdict as Core;
        match verdict {
            Core::MessagingShouldDisplay => Self::MessagingShouldDisplay,
            Core::MessagingShouldNotDisplay => Self::MessagingShouldNotDisplay,
            Core::NotFromMessaging => Self::NotFromMessaging,
            Core::Unknown => Self::Unknown,
        }
    }
}

impl From<NotificationResponsibility> for parley_sdk::ResponsibilityVerdict {
    fn from(verdict: NotificationResponsibility) -> Self {
        match verdict {
            NotificationResponsibility::MessagingShouldDisplay => Self::MessagingShouldDisplay,
            NotificationResponsibility::MessagingShouldNotDisplay => Self::MessagingShouldNotDisplay,
            NotificationResponsibility::NotFromMessaging => Self::NotFromMessaging,
            NotificationResponsibility::Unknown => Self::Unknown,
        }
    }
}

/// Wire string of a verdict, e.g. `MESSAGING_SHOULD_DISPLAY`
#[uniffi::export]
pub fn responsibility_name(verdict: NotificationResponsibility) -> String {
    parley_sdk::ResponsibilityVerdict::from(verdict).as_str().to_string()
}

// ============================================================================
// Subscription
// ============================================================================

/// Handle of a registered listener
#[derive(uniffi::Object)]
pub struct Subscription {
    inner: parley_sdk::Subscription,
}

impl Subscription {
    pub(crate) fn new(inner: parley_sdk::Subscription) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &parley_sdk::Subscription {
        &self.inner
    }
}

#[uniffi::export]
impl Subscription {
    pub fn id(&self) -> u64 {
        self.inner.id()
    }

    pub fn event_type(&self) -> EventType {
        self.inner.event_type().into()
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    /// Detach the listener; safe to call repeatedly
    pub fn remove(&self) {
        self.inner.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_names_match_core() {
        assert_eq!(event_type_name(EventType::UnreadMessageCountChanged), "unreadMessageCountChanged");
        assert_eq!(event_type_name(EventType::ConversationAdded), "conversationAdded");
    }

    #[test]
    fn responsibility_names_are_wire_strings() {
        assert_eq!(
            responsibility_name(NotificationResponsibility::MessagingShouldNotDisplay),
            "MESSAGING_SHOULD_NOT_DISPLAY"
        );
        assert_eq!(responsibility_name(NotificationResponsibility::Unknown), "UNKNOWN");
    }

    #[test]
    fn other_native_events_stay_unrecognized() {
        let event: parley_sdk::SdkEvent = NativeSdkEvent::Other { name: "typingStarted".into() }.into();
        assert_eq!(parley_sdk::MessagingEvent::from_sdk(&event), None);

        let event: parley_sdk::SdkEvent = NativeSdkEvent::ConnectionStatusChanged {
            connection_status: ConnectionStatus::ConnectedRealtime,
        }
        .into();
        let normalized = parley_sdk::MessagingEvent::from_sdk(&event).map(MessagingEvent::from);
        assert_eq!(
            normalized,
            Some(MessagingEvent::ConnectionStatusChanged {
                connection_status: ConnectionStatus::ConnectedRealtime
            })
        );
    }
}
