//! Event bridge - normalizes SDK events and fans them out to listeners
//!
//! The bridge owns the listener registry for the whole lifetime of the
//! [`LifecycleManager`](crate::LifecycleManager); only the SDK attachment is
//! per session. Features:
//! - six-variant [`MessagingEvent`] taxonomy with stable wire names
//! - per-type registration returning a [`Subscription`]
//! - dispatch on a dedicated task so the SDK's delivery loop is never blocked
//! - panic isolation between listeners

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::ParleyError;
use crate::session::SdkEvent;

/// Connection state reported by the SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    /// Realtime channel established on top of the base connection
    ConnectedRealtime,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::ConnectedRealtime => "connectedRealtime",
        };
        f.write_str(name)
    }
}

/// Event names listeners register under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    UnreadMessageCountChanged,
    AuthenticationFailed,
    FieldValidationFailed,
    ConnectionStatusChanged,
    SendMessageFailed,
    ConversationAdded,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::UnreadMessageCountChanged,
        EventType::AuthenticationFailed,
        EventType::FieldValidationFailed,
        EventType::ConnectionStatusChanged,
        EventType::SendMessageFailed,
        EventType::ConversationAdded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::UnreadMessageCountChanged => "unreadMessageCountChanged",
            EventType::AuthenticationFailed => "authenticationFailed",
            EventType::FieldValidationFailed => "fieldValidationFailed",
            EventType::ConnectionStatusChanged => "connectionStatusChanged",
            EventType::SendMessageFailed => "sendMessageFailed",
            EventType::ConversationAdded => "conversationAdded",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParleyError::validation("event_type", &format!("unknown event type '{}'", s)))
    }
}

/// Normalized event delivered to listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MessagingEvent {
    UnreadMessageCountChanged { unread_count: u32 },
    AuthenticationFailed { reason: String },
    FieldValidationFailed { errors: Vec<String> },
    ConnectionStatusChanged { connection_status: ConnectionStatus },
    SendMessageFailed { cause: String },
    ConversationAdded { conversation_id: String },
}

impl MessagingEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            MessagingEvent::UnreadMessageCountChanged { .. } => EventType::UnreadMessageCountChanged,
            MessagingEvent::AuthenticationFailed { .. } => EventType::AuthenticationFailed,
            MessagingEvent::FieldValidationFailed { .. } => EventType::FieldValidationFailed,
            MessagingEvent::ConnectionStatusChanged { .. } => EventType::ConnectionStatusChanged,
            MessagingEvent::SendMessageFailed { .. } => EventType::SendMessageFailed,
            MessagingEvent::ConversationAdded { .. } => EventType::ConversationAdded,
        }
    }

    /// Payload object as emitted to listeners, e.g. `{"unreadCount": 3}`
    pub fn payload(&self) -> serde_json::Value {
        match self {
            MessagingEvent::UnreadMessageCountChanged { unread_count } => json!({ "unreadCount": unread_count }),
            MessagingEvent::AuthenticationFailed { reason } => json!({ "reason": reason }),
            MessagingEvent::FieldValidationFailed { errors } => json!({ "errors": errors }),
            MessagingEvent::ConnectionStatusChanged { connection_status } => {
                json!({ "connectionStatus": connection_status })
            }
            MessagingEvent::SendMessageFailed { cause } => json!({ "cause": cause }),
            MessagingEvent::ConversationAdded { conversation_id } => json!({ "conversationId": conversation_id }),
        }
    }

    /// Translate an SDK event; `None` for events outside the taxonomy
    pub fn from_sdk(event: &SdkEvent) -> Option<Self> {
        let mapped = match event {
            SdkEvent::UnreadMessageCountChanged { current_unread_count } => {
                MessagingEvent::UnreadMessageCountChanged { unread_count: *current_unread_count }
            }
            SdkEvent::AuthenticationFailed { error } => MessagingEvent::AuthenticationFailed { reason: error.clone() },
            SdkEvent::FieldValidationFailed { errors } => MessagingEvent::FieldValidationFailed { errors: errors.clone() },
            SdkEvent::ConnectionStatusChanged { connection_status } => {
                MessagingEvent::ConnectionStatusChanged { connection_status: *connection_status }
            }
            SdkEvent::SendMessageFailed { cause } => MessagingEvent::SendMessageFailed { cause: cause.clone() },
            SdkEvent::ConversationAdded { conversation_id } => {
                MessagingEvent::ConversationAdded { conversation_id: conversation_id.clone() }
            }
            SdkEvent::Unrecognized { .. } => return None,
        };
        Some(mapped)
    }
}

/// Listener callback type
pub type EventListener = Arc<dyn Fn(&MessagingEvent) + Send + Sync>;

/// Bridge counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStats {
    pub total_events: u64,
    pub events_by_type: HashMap<EventType, u64>,
    /// SDK events with no counterpart in the taxonomy
    pub unrecognized_events: u64,
    /// Events skipped because the dispatch task fell behind
    pub lagged_events: u64,
    pub listener_panics: u64,
}

#[derive(Default)]
struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<EventType, Vec<(u64, EventListener)>>>,
}

impl ListenerRegistry {
    fn insert(&self, event_type: EventType, listener: EventListener) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.listeners.lock().entry(event_type).or_default().push((id, listener));
        id
    }

    fn remove(&self, event_type: EventType, id: u64) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(group) = listeners.get_mut(&event_type) else {
            return false;
        };
        let before = group.len();
        group.retain(|(listener_id, _)| *listener_id != id);
        before != group.len()
    }

    fn snapshot(&self, event_type: EventType) -> Vec<EventListener> {
        self.listeners
            .lock()
            .get(&event_type)
            .map(|group| group.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default()
    }
}

/// Handle returned by [`EventBridge::add_event_listener`]
///
/// Dropping the handle does not detach the listener; call [`Subscription::remove`].
pub struct Subscription {
    id: u64,
    event_type: EventType,
    registry: Weak<ListenerRegistry>,
    removed: AtomicBool,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn is_active(&self) -> bool {
        !self.removed.load(Ordering::SeqCst)
    }

    /// Detach this listener. Further calls are no-ops.
    pub fn remove(&self) {
        if self.removed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.event_type, self.id) {
                debug!("Removed listener #{} for {}", self.id, self.event_type);
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .field("active", &self.is_active())
            .finish()
    }
}

/// State shared with the dispatch task
struct BridgeShared {
    registry: Arc<ListenerRegistry>,
    /// Generation currently allowed to deliver; 0 when detached
    active_generation: AtomicU64,
    last_unread_count: Mutex<Option<u32>>,
    stats: Mutex<EventStats>,
}

impl BridgeShared {
    fn dispatch(&self, generation: u64, event: &MessagingEvent) {
        let event_type = event.event_type();
        debug!("Dispatching event: {}", event_type);

        {
            let mut stats = self.stats.lock();
            stats.total_events += 1;
            *stats.events_by_type.entry(event_type).or_insert(0) += 1;
        }

        if let MessagingEvent::UnreadMessageCountChanged { unread_count } = event {
            self.record_unread_count(generation, *unread_count);
        }

        // Snapshot so listeners may (un)register from inside a callback
        for listener in self.registry.snapshot(event_type) {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!("Listener for {} panicked, continuing with the rest", event_type);
                self.stats.lock().listener_panics += 1;
            }
        }
    }

    /// `detach` clears the count under the same lock
    fn record_unread_count(&self, generation: u64, count: u32) {
        let mut last = self.last_unread_count.lock();
        if self.active_generation.load(Ordering::SeqCst) == generation {
            *last = Some(count);
        }
    }
}

struct Attachment {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct EventBridge {
    shared: Arc<BridgeShared>,
    attachment: Mutex<Option<Attachment>>,
}

impl EventBridge {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(BridgeShared {
                registry: Arc::new(ListenerRegistry::default()),
                active_generation: AtomicU64::new(0),
                last_unread_count: Mutex::new(None),
                stats: Mutex::new(EventStats::default()),
            }),
            attachment: Mutex::new(None),
        }
    }

    pub fn add_event_listener<F>(&self, event_type: EventType, listener: F) -> Subscription
    where
        F: Fn(&MessagingEvent) + Send + Sync + 'static,
    {
        let id = self.shared.registry.insert(event_type, Arc::new(listener));
        info!("Added listener #{} for event type: {}", id, event_type);
        Subscription {
            id,
            event_type,
            registry: Arc::downgrade(&self.shared.registry),
            removed: AtomicBool::new(false),
        }
    }

    pub fn remove_subscription(&self, subscription: &Subscription) {
        subscription.remove();
    }

    /// Detach every listener of one type; other types are untouched
    pub fn remove_all_listeners(&self, event_type: EventType) {
        let removed = self
            .shared
            .registry
            .listeners
            .lock()
            .remove(&event_type)
            .map(|group| group.len())
            .unwrap_or(0);
        info!("Removed {} listener(s) for event type: {}", removed, event_type);
    }

    pub fn listener_count(&self, event_type: EventType) -> usize {
        self.shared
            .registry
            .listeners
            .lock()
            .get(&event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Start forwarding one session's events
    ///
    /// Returns `false` when this generation is already attached.
    pub fn attach(&self, generation: u64, mut receiver: broadcast::Receiver<SdkEvent>, runtime: &Handle) -> bool {
        let mut attachment = self.attachment.lock();
        if let Some(current) = attachment.as_ref() {
            if current.generation == generation {
                warn!("Event bridge already attached for session #{}", generation);
                return false;
            }
            warn!("Replacing stale event bridge of session #{}", current.generation);
            current.handle.abort();
        }

        self.shared.active_generation.store(generation, Ordering::SeqCst);
        let shared = self.shared.clone();
        let handle = runtime.spawn(async move {
            debug!("Event bridge task started for session #{}", generation);
            loop {
                match receiver.recv().await {
                    Ok(sdk_event) => {
                        if shared.active_generation.load(Ordering::SeqCst) != generation {
                            break;
                        }
                        match MessagingEvent::from_sdk(&sdk_event) {
                            Some(event) => shared.dispatch(generation, &event),
                            None => {
                                debug!("Ignoring SDK event outside the taxonomy: {:?}", sdk_event);
                                shared.stats.lock().unrecognized_events += 1;
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Event bridge lagged, {} SDK event(s) skipped", skipped);
                        shared.stats.lock().lagged_events += skipped;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Event bridge task ended for session #{}", generation);
        });

        *attachment = Some(Attachment { generation, handle });
        info!("✅ Event bridge attached for session #{}", generation);
        true
    }

    /// Stop forwarding; listeners stay registered
    pub fn detach(&self) {
        self.shared.active_generation.store(0, Ordering::SeqCst);
        *self.shared.last_unread_count.lock() = None;
        if let Some(attachment) = self.attachment.lock().take() {
            attachment.handle.abort();
            info!("Event bridge detached from session #{}", attachment.generation);
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.lock().is_some()
    }

    /// Last count seen in an `unreadMessageCountChanged` event of the attached session
    pub fn last_unread_count(&self) -> Option<u32> {
        *self.shared.last_unread_count.lock()
    }

    pub fn stats(&self) -> EventStats {
        self.shared.stats.lock().clone()
    }
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        if let Some(attachment) = self.attachment.get_mut().take() {
            attachment.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::eventually;
    use std::sync::atomic::AtomicUsize;

    fn recorder(bridge: &EventBridge, event_type: EventType) -> (Subscription, Arc<Mutex<Vec<MessagingEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = bridge.add_event_listener(event_type, move |event| sink.lock().push(event.clone()));
        (sub, seen)
    }

    #[test]
    fn event_type_names_round_trip() {
        for event_type in EventType::ALL {
            assert_eq!(event_type.as_str().parse::<EventType>().unwrap(), event_type);
        }
        assert!("messageReceived".parse::<EventType>().is_err());
    }

    #[test]
    fn payload_shapes_match_wire_names() {
        let event = MessagingEvent::UnreadMessageCountChanged { unread_count: 3 };
        assert_eq!(event.payload(), json!({ "unreadCount": 3 }));

        let event = MessagingEvent::ConnectionStatusChanged {
            connection_status: ConnectionStatus::ConnectedRealtime,
        };
        assert_eq!(event.payload(), json!({ "connectionStatus": "connectedRealtime" }));

        let event = MessagingEvent::ConversationAdded { conversation_id: "c1".into() };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "conversationAdded": { "conversationId": "c1" } })
        );
    }

    #[test]
    fn unrecognized_sdk_events_are_dropped() {
        assert_eq!(MessagingEvent::from_sdk(&SdkEvent::Unrecognized { name: "typing".into() }), None);
        assert_eq!(
            MessagingEvent::from_sdk(&SdkEvent::AuthenticationFailed { error: "expired".into() }),
            Some(MessagingEvent::AuthenticationFailed { reason: "expired".into() })
        );
    }

    #[tokio::test]
    async fn dispatches_in_emission_order_to_matching_type_only() {
        let bridge = EventBridge::new();
        let (_unread, unread_seen) = recorder(&bridge, EventType::UnreadMessageCountChanged);
        let (_added, added_seen) = recorder(&bridge, EventType::ConversationAdded);

        let (tx, rx) = broadcast::channel(16);
        assert!(bridge.attach(1, rx, &Handle::current()));

        for count in [1, 2, 3] {
            tx.send(SdkEvent::UnreadMessageCountChanged { current_unread_count: count }).unwrap();
        }
        tx.send(SdkEvent::Unrecognized { name: "typing".into() }).unwrap();

        eventually(|| unread_seen.lock().len() == 3).await;
        let counts: Vec<_> = unread_seen
            .lock()
            .iter()
            .map(|e| match e {
                MessagingEvent::UnreadMessageCountChanged { unread_count } => *unread_count,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(counts, vec![1, 2, 3]);
        assert!(added_seen.lock().is_empty());
        assert_eq!(bridge.last_unread_count(), Some(3));

        eventually(|| bridge.stats().unrecognized_events == 1).await;
        assert_eq!(bridge.stats().total_events, 3);
    }

    #[tokio::test]
    async fn panicking_listener_does_not_block_others() {
        let bridge = EventBridge::new();
        bridge.add_event_listener(EventType::SendMessageFailed, |_| panic!("listener bug"));
        let (_sub, seen) = recorder(&bridge, EventType::SendMessageFailed);

        let (tx, rx) = broadcast::channel(16);
        bridge.attach(1, rx, &Handle::current());
        tx.send(SdkEvent::SendMessageFailed { cause: "offline".into() }).unwrap();
        tx.send(SdkEvent::SendMessageFailed { cause: "too large".into() }).unwrap();

        eventually(|| seen.lock().len() == 2).await;
        assert_eq!(bridge.stats().listener_panics, 2);
    }

    #[tokio::test]
    async fn subscription_remove_is_exact_and_idempotent() {
        let bridge = EventBridge::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let c = first.clone();
        let sub_first = bridge.add_event_listener(EventType::AuthenticationFailed, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let c = second.clone();
        let _sub_second = bridge.add_event_listener(EventType::AuthenticationFailed, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bridge.listener_count(EventType::AuthenticationFailed), 2);

        sub_first.remove();
        sub_first.remove();
        bridge.remove_subscription(&sub_first);
        assert!(!sub_first.is_active());
        assert_eq!(bridge.listener_count(EventType::AuthenticationFailed), 1);

        let (tx, rx) = broadcast::channel(16);
        bridge.attach(1, rx, &Handle::current());
        tx.send(SdkEvent::AuthenticationFailed { error: "expired".into() }).unwrap();

        eventually(|| second.load(Ordering::SeqCst) == 1).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn remove_all_listeners_only_touches_one_type() {
        let bridge = EventBridge::new();
        let (_a, _) = recorder(&bridge, EventType::ConversationAdded);
        let (_b, _) = recorder(&bridge, EventType::ConversationAdded);
        let (_c, _) = recorder(&bridge, EventType::ConnectionStatusChanged);

        bridge.remove_all_listeners(EventType::ConversationAdded);
        assert_eq!(bridge.listener_count(EventType::ConversationAdded), 0);
        assert_eq!(bridge.listener_count(EventType::ConnectionStatusChanged), 1);
    }

    #[tokio::test]
    async fn attach_is_once_per_generation_and_detach_stops_delivery() {
        let bridge = EventBridge::new();
        let (_sub, seen) = recorder(&bridge, EventType::UnreadMessageCountChanged);

        let (tx, rx) = broadcast::channel(16);
        assert!(bridge.attach(7, rx, &Handle::current()));
        assert!(!bridge.attach(7, tx.subscribe(), &Handle::current()));

        tx.send(SdkEvent::UnreadMessageCountChanged { current_unread_count: 1 }).unwrap();
        eventually(|| seen.lock().len() == 1).await;

        bridge.detach();
        assert!(!bridge.is_attached());
        assert_eq!(bridge.last_unread_count(), None);

        let _ = tx.send(SdkEvent::UnreadMessageCountChanged { current_unread_count: 2 });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn stale_generation_cannot_restore_unread_count_after_detach() {
        let bridge = EventBridge::new();
        let (tx, rx) = broadcast::channel(16);
        assert!(bridge.attach(3, rx, &Handle::current()));
        tx.send(SdkEvent::UnreadMessageCountChanged { current_unread_count: 4 }).unwrap();
        eventually(|| bridge.last_unread_count() == Some(4)).await;

        bridge.detach();
        // A dispatch of the detached session still in flight
        bridge.shared.record_unread_count(3, 8);
        assert_eq!(bridge.last_unread_count(), None);

        let (_tx2, rx2) = broadcast::channel(16);
        assert!(bridge.attach(4, rx2, &Handle::current()));
        bridge.shared.record_unread_count(3, 8);
        assert_eq!(bridge.last_unread_count(), None);
        bridge.shared.record_unread_count(4, 1);
        assert_eq!(bridge.last_unread_count(), Some(1));
    }
}
