//! Native SDK plumbing
//!
//! Kotlin and Swift implement the callback interfaces below over their own
//! messaging SDK objects. The adapters at the bottom turn them into the core
//! crate's `Session`, `SessionFactory`, `PushPlatform` and `PresentationHost`.
//!
//! Native success/failure handlers are modeled as completion objects. Each one
//! settles exactly once: a second settlement is logged and ignored, and a
//! completion dropped without settling fails the pending operation.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, warn};

use parley_sdk::{
    DisplayRequest, NotificationPayload, PresentationHost, PushPlatform, PushResponsibility, SdkEvent, Session,
    SessionError, SessionErrorKind, SessionFactory, User, ViewTarget,
};

use crate::events::{MessagingUser, NativeSdkEvent};

// ============================================================================
// Shared records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum NativeErrorKind {
    /// The SDK refused the input (channel key, token)
    Rejected,
    Network,
    /// Nothing to act on, e.g. logout with no user
    Unavailable,
    Other,
}

/// Failure reported by the native SDK
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct NativeError {
    pub kind: NativeErrorKind,
    pub message: String,
}

impl From<NativeError> for SessionError {
    fn from(error: NativeError) -> Self {
        let kind = match error.kind {
            NativeErrorKind::Rejected => SessionErrorKind::Rejected,
            NativeErrorKind::Network => SessionErrorKind::Network,
            NativeErrorKind::Unavailable => SessionErrorKind::Unavailable,
            NativeErrorKind::Other => SessionErrorKind::Other,
        };
        SessionError::new(kind, error.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum PresentationTarget {
    Messaging,
    Conversation { conversation_id: String },
}

impl From<&ViewTarget> for PresentationTarget {
    fn from(target: &ViewTarget) -> Self {
        match target {
            ViewTarget::Messaging => Self::Messaging,
            ViewTarget::Conversation { conversation_id } => Self::Conversation {
                conversation_id: conversation_id.clone(),
            },
        }
    }
}

/// System notification the push platform should render
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct NotificationDisplay {
    pub title: Option<String>,
    pub body: Option<String>,
    /// Handed back through `handle_notification_click` when tapped
    pub tap_payload: HashMap<String, String>,
}

impl From<&DisplayRequest> for NotificationDisplay {
    fn from(request: &DisplayRequest) -> Self {
        Self {
            title: request.title.clone(),
            body: request.body.clone(),
            tap_payload: request.tap_payload.clone(),
        }
    }
}

// ============================================================================
// Callback Interfaces
// ============================================================================

/// Entry point of the native messaging SDK
#[uniffi::export(callback_interface)]
pub trait NativeMessagingSdk: Send + Sync {
    /// Start a session for `channel_key`
    ///
    /// Forward SDK events into `events` and settle `completion` once.
    fn create_session(&self, channel_key: String, events: Arc<EventSink>, completion: Arc<InitCompletion>);
}

/// One live native session, handed over through `InitCompletion::succeed`
#[uniffi::export(callback_interface)]
pub trait NativeSession: Send + Sync {
    fn login_user(&self, token: String, completion: Arc<LoginCompletion>);

    fn logout_user(&self, completion: Arc<UnitCompletion>);

    fn invalidate(&self);

    /// `None` when the SDK cannot tell
    fn unread_message_count(&self) -> Option<u32>;

    fn can_open_messaging(&self) -> bool;

    /// Conversation a tapped notification belongs to
    fn conversation_for_notification(&self, payload: HashMap<String, String>) -> Option<String>;
}

/// Process-wide push primitives; platforms without push pass none
#[uniffi::export(callback_interface)]
pub trait NativePushPlatform: Send + Sync {
    /// SDK responsibility as its wire string, e.g. `MESSAGING_SHOULD_DISPLAY`
    fn should_be_displayed(&self, payload: HashMap<String, String>) -> String;

    /// Returns false when the notification could not be shown
    fn display_notification(&self, notification: NotificationDisplay) -> bool;

    fn update_push_notification_token(&self, token: Vec<u8>);
}

#[uniffi::export(callback_interface)]
pub trait NativePresentationHost: Send + Sync {
    /// Returns the failure reason, `None` once presented
    fn present(&self, target: PresentationTarget) -> Option<String>;
}

// ============================================================================
// Completions
// ============================================================================

type Settled<T> = Result<T, SessionError>;

struct Settlement<T> {
    operation: &'static str,
    sender: Mutex<Option<oneshot::Sender<Settled<T>>>>,
}

impl<T> Settlement<T> {
    fn new(operation: &'static str) -> (Self, oneshot::Receiver<Settled<T>>) {
        let (tx, rx) = oneshot::channel();
        let settlement = Self {
            operation,
            sender: Mutex::new(Some(tx)),
        };
        (settlement, rx)
    }

    fn settle(&self, result: Settled<T>) {
        let Some(sender) = self.sender.lock().take() else {
            warn!("⚠️ {} completion settled more than once, ignoring", self.operation);
            return;
        };
        if sender.send(result).is_err() {
            debug!("{} settled after the caller went away", self.operation);
        }
    }

    fn is_settled(&self) -> bool {
        self.sender.lock().is_none()
    }
}

async fn settled<T>(operation: &'static str, receiver: oneshot::Receiver<Settled<T>>) -> Settled<T> {
    match receiver.await {
        Ok(result) => result,
        Err(_) => {
            warn!("{} completion dropped without settling", operation);
            Err(SessionError::other(format!(
                "{} completion dropped without settling",
                operation
            )))
        }
    }
}

#[derive(uniffi::Object)]
pub struct InitCompletion {
    settlement: Settlement<Arc<dyn NativeSession>>,
}

impl InitCompletion {
    fn new() -> (Self, oneshot::Receiver<Settled<Arc<dyn NativeSession>>>) {
        let (settlement, rx) = Settlement::new("initialize");
        (Self { settlement }, rx)
    }
}

#[uniffi::export]
impl InitCompletion {
    pub fn succeed(&self, session: Box<dyn NativeSession>) {
        self.settlement.settle(Ok(Arc::from(session)));
    }

    pub fn fail(&self, error: NativeError) {
        self.settlement.settle(Err(error.into()));
    }

    pub fn is_settled(&self) -> bool {
        self.settlement.is_settled()
    }
}

#[derive(uniffi::Object)]
pub struct LoginCompletion {
    settlement: Settlement<User>,
}

impl LoginCompletion {
    fn new() -> (Self, oneshot::Receiver<Settled<User>>) {
        let (settlement, rx) = Settlement::new("login_user");
        (Self { settlement }, rx)
    }
}

#[uniffi::export]
impl LoginCompletion {
    pub fn succeed(&self, user: MessagingUser) {
        self.settlement.settle(Ok(user.into()));
    }

    pub fn fail(&self, error: NativeError) {
        self.settlement.settle(Err(error.into()));
    }

    pub fn is_settled(&self) -> bool {
        self.settlement.is_settled()
    }
}

#[derive(uniffi::Object)]
pub struct UnitCompletion {
    settlement: Settlement<()>,
}

impl UnitCompletion {
    fn new(operation: &'static str) -> (Self, oneshot::Receiver<Settled<()>>) {
        let (settlement, rx) = Settlement::new(operation);
        (Self { settlement }, rx)
    }
}

#[uniffi::export]
impl UnitCompletion {
    pub fn succeed(&self) {
        self.settlement.settle(Ok(()));
    }

    pub fn fail(&self, error: NativeError) {
        self.settlement.settle(Err(error.into()));
    }

    pub fn is_settled(&self) -> bool {
        self.settlement.is_settled()
    }
}

// ============================================================================
// Event sink
// ============================================================================

/// Where a native session pushes its SDK events
///
/// Closed when the session is invalidated; later events are dropped.
#[derive(uniffi::Object)]
pub struct EventSink {
    sender: broadcast::Sender<SdkEvent>,
    closed: AtomicBool,
}

impl EventSink {
    fn new(sender: broadcast::Sender<SdkEvent>) -> Self {
        Self {
            sender,
            closed: AtomicBool::new(false),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[uniffi::export]
impl EventSink {
    pub fn emit(&self, event: NativeSdkEvent) {
        if self.closed.load(Ordering::SeqCst) {
            debug!("Event sink closed, dropping {:?}", event);
            return;
        }
        // No receiver simply means nobody is attached yet
        let _ = self.sender.send(event.into());
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Adapters
// ============================================================================

pub(crate) struct NativeSessionFactory {
    sdk: Arc<dyn NativeMessagingSdk>,
    event_capacity: usize,
}

impl NativeSessionFactory {
    pub(crate) fn new(sdk: Arc<dyn NativeMessagingSdk>, event_capacity: usize) -> Self {
        Self { sdk, event_capacity }
    }
}

#[async_trait]
impl SessionFactory for NativeSessionFactory {
    async fn create(&self, channel_key: &str) -> Result<Arc<dyn Session>, SessionError> {
        let (sender, _) = broadcast::channel(self.event_capacity);
        let sink = Arc::new(EventSink::new(sender.clone()));
        let (completion, rx) = InitCompletion::new();

        self.sdk
            .create_session(channel_key.to_string(), sink.clone(), Arc::new(completion));

        match settled("initialize", rx).await {
            Ok(native) => {
                let session = NativeSessionAdapter {
                    native,
                    events: sender,
                    sink,
                };
                Ok(Arc::new(session) as Arc<dyn Session>)
            }
            Err(e) => {
                sink.close();
                Err(e)
            }
        }
    }
}

struct NativeSessionAdapter {
    native: Arc<dyn NativeSession>,
    events: broadcast::Sender<SdkEvent>,
    sink: Arc<EventSink>,
}

#[async_trait]
impl Session for NativeSessionAdapter {
    async fn login_user(&self, token: &str) -> Result<User, SessionError> {
        let (completion, rx) = LoginCompletion::new();
        self.native.login_user(token.to_string(), Arc::new(completion));
        settled("login_user", rx).await
    }

    async fn logout_user(&self) -> Result<(), SessionError> {
        let (completion, rx) = UnitCompletion::new("logout_user");
        self.native.logout_user(Arc::new(completion));
        settled("logout_user", rx).await
    }

    fn invalidate(&self) {
        self.sink.close();
        self.native.invalidate();
    }

    async fn unread_message_count(&self) -> Option<u32> {
        // Native getter may block on SDK internals; keep it off the async workers
        let native = self.native.clone();
        match tokio::task::spawn_blocking(move || native.unread_message_count()).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Unread count query failed: {}", e);
                None
            }
        }
    }

    fn subscribe_events(&self) -> broadcast::Receiver<SdkEvent> {
        self.events.subscribe()
    }

    fn messaging_target(&self) -> Option<ViewTarget> {
        self.native.can_open_messaging().then_some(ViewTarget::Messaging)
    }

    fn resolve_tap(&self, payload: &NotificationPayload) -> Option<ViewTarget> {
        self.native
            .conversation_for_notification(payload.clone())
            .map(|conversation_id| ViewTarget::Conversation { conversation_id })
    }
}

pub(crate) struct NativePushAdapter {
    native: Box<dyn NativePushPlatform>,
}

impl NativePushAdapter {
    pub(crate) fn new(native: Box<dyn NativePushPlatform>) -> Self {
        Self { native }
    }
}

/// Parse the SDK's responsibility string
fn parse_responsibility(raw: String) -> PushResponsibility {
    match raw.as_str() {
        "MESSAGING_SHOULD_DISPLAY" => PushResponsibility::MessagingShouldDisplay,
        "MESSAGING_SHOULD_NOT_DISPLAY" => PushResponsibility::MessagingShouldNotDisplay,
        "NOT_FROM_MESSAGING" => PushResponsibility::NotFromMessaging,
        _ => PushResponsibility::Unrecognized(raw),
    }
}

impl PushPlatform for NativePushAdapter {
    fn should_be_displayed(&self, payload: &NotificationPayload) -> PushResponsibility {
        parse_responsibility(self.native.should_be_displayed(payload.clone()))
    }

    fn display_notification(&self, request: &DisplayRequest) -> Result<(), SessionError> {
        if self.native.display_notification(request.into()) {
            Ok(())
        } else {
            Err(SessionError::other("platform could not display the notification"))
        }
    }

    fn update_push_notification_token(&self, token: &[u8]) {
        self.native.update_push_notification_token(token.to_vec());
    }
}

pub(crate) struct NativeHostAdapter {
    native: Box<dyn NativePresentationHost>,
}

impl NativeHostAdapter {
    pub(crate) fn new(native: Box<dyn NativePresentationHost>) -> Self {
        Self { native }
    }
}

impl PresentationHost for NativeHostAdapter {
    fn present(&self, target: &ViewTarget) -> Result<(), String> {
        match self.native.present(target.into()) {
            None => Ok(()),
            Some(reason) => Err(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completion_settles_once() {
        let (completion, rx) = UnitCompletion::new("logout_user");
        completion.fail(NativeError {
            kind: NativeErrorKind::Network,
            message: "offline".into(),
        });
        completion.succeed();
        assert!(completion.is_settled());

        let err = settled("logout_user", rx).await.unwrap_err();
        assert_eq!(err, SessionError::network("offline"));
    }

    #[tokio::test]
    async fn dropped_completion_fails_the_operation() {
        let (completion, rx) = LoginCompletion::new();
        drop(completion);

        let err = settled("login_user", rx).await.unwrap_err();
        assert_eq!(err.kind, SessionErrorKind::Other);
        assert!(err.message.contains("dropped without settling"));
    }

    #[test]
    fn closed_sink_drops_events() {
        let (sender, mut rx) = broadcast::channel(4);
        let sink = EventSink::new(sender);

        sink.emit(NativeSdkEvent::SendMessageFailed { cause: "offline".into() });
        sink.close();
        sink.emit(NativeSdkEvent::SendMessageFailed { cause: "late".into() });

        assert_eq!(
            rx.try_recv().unwrap(),
            SdkEvent::SendMessageFailed { cause: "offline".into() }
        );
        assert!(rx.try_recv().is_err());
        assert!(!sink.is_open());
    }

    #[test]
    fn unknown_responsibility_strings_are_kept() {
        assert_eq!(
            parse_responsibility("MESSAGING_SHOULD_NOT_DISPLAY".into()),
            PushResponsibility::MessagingShouldNotDisplay
        );
        assert_eq!(
            parse_responsibility("SOMETHING_NEW".into()),
            PushResponsibility::Unrecognized("SOMETHING_NEW".into())
        );
    }
}
