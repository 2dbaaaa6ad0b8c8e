//! In-memory doubles for the SDK capabilities
//!
//! Enabled for unit tests and, through the `testing` feature, for downstream
//! crates that want to drive a [`LifecycleManager`](crate::LifecycleManager)
//! without a native SDK.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

use crate::config::DEFAULT_EVENT_CHANNEL_CAPACITY;
use crate::notification::{DisplayRequest, NotificationPayload};
use crate::session::{
    PresentationHost, PushPlatform, PushResponsibility, SdkEvent, Session, SessionError, SessionFactory, User,
    ViewTarget,
};

pub const VALID_TOKEN: &str = "valid-jwt";

/// Payload shaped like a messaging push for `conversation_id`
pub fn messaging_payload(conversation_id: &str) -> NotificationPayload {
    NotificationPayload::from([
        ("conversation_id".to_string(), conversation_id.to_string()),
        ("message_id".to_string(), format!("m-{}", conversation_id)),
        ("title".to_string(), "New message".to_string()),
        ("body".to_string(), "Hello from support".to_string()),
    ])
}

/// Poll `condition` until it holds; panics after two seconds
pub async fn eventually<F>(condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not reached within 2s");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub struct MockSession {
    events: broadcast::Sender<SdkEvent>,
    users: HashMap<String, User>,
    logout_error: Mutex<Option<SessionError>>,
    unread: Mutex<Option<u32>>,
    unread_delay: Mutex<Option<Duration>>,
    messaging_available: AtomicBool,
    invalidate_calls: AtomicUsize,
    login_calls: AtomicUsize,
}

impl MockSession {
    fn new(users: HashMap<String, User>) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CHANNEL_CAPACITY);
        Self {
            events,
            users,
            logout_error: Mutex::new(None),
            unread: Mutex::new(Some(0)),
            unread_delay: Mutex::new(None),
            messaging_available: AtomicBool::new(true),
            invalidate_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
        }
    }

    /// Emit an SDK event; dropped silently when nobody listens
    pub fn emit(&self, event: SdkEvent) {
        let _ = self.events.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Every subsequent logout fails with `error`
    pub fn fail_logout(&self, error: SessionError) {
        *self.logout_error.lock() = Some(error);
    }

    pub fn set_unread(&self, count: Option<u32>) {
        *self.unread.lock() = count;
    }

    pub fn set_unread_delay(&self, delay: Option<Duration>) {
        *self.unread_delay.lock() = delay;
    }

    pub fn set_messaging_available(&self, available: bool) {
        self.messaging_available.store(available, Ordering::SeqCst);
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidate_calls() > 0
    }

    pub fn invalidate_calls(&self) -> usize {
        self.invalidate_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for MockSession {
    async fn login_user(&self, token: &str) -> Result<User, SessionError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.users
            .get(token)
            .cloned()
            .ok_or_else(|| SessionError::rejected("invalid token"))
    }

    async fn logout_user(&self) -> Result<(), SessionError> {
        match self.logout_error.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn invalidate(&self) {
        self.invalidate_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn unread_message_count(&self) -> Option<u32> {
        let delay = *self.unread_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        *self.unread.lock()
    }

    fn subscribe_events(&self) -> broadcast::Receiver<SdkEvent> {
        self.events.subscribe()
    }

    fn messaging_target(&self) -> Option<ViewTarget> {
        self.messaging_available
            .load(Ordering::SeqCst)
            .then_some(ViewTarget::Messaging)
    }

    fn resolve_tap(&self, payload: &NotificationPayload) -> Option<ViewTarget> {
        payload
            .get("conversation_id")
            .map(|id| ViewTarget::Conversation { conversation_id: id.clone() })
    }
}

pub struct MockSessionFactory {
    users: Mutex<HashMap<String, User>>,
    rejection: Mutex<Option<SessionError>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    sessions: Mutex<Vec<Arc<MockSession>>>,
    create_calls: AtomicUsize,
}

impl MockSessionFactory {
    pub fn new() -> Arc<Self> {
        let users = HashMap::from([(
            VALID_TOKEN.to_string(),
            User {
                id: "u1".to_string(),
                external_id: "ext1".to_string(),
            },
        )]);
        Arc::new(Self {
            users: Mutex::new(users),
            rejection: Mutex::new(None),
            gate: Mutex::new(None),
            sessions: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
        })
    }

    /// Accept `token` for sessions created from now on
    pub fn add_user(&self, token: &str, user: User) {
        self.users.lock().insert(token.to_string(), user);
    }

    /// Fail the next `create` with `error`
    pub fn reject_next(&self, error: SessionError) {
        *self.rejection.lock() = Some(error);
    }

    /// Suspend the next `create` until the returned sender fires (or drops)
    pub fn hold_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock() = Some(rx);
        tx
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> Vec<Arc<MockSession>> {
        self.sessions.lock().clone()
    }

    pub fn last_session(&self) -> Option<Arc<MockSession>> {
        self.sessions.lock().last().cloned()
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn create(&self, _channel_key: &str) -> Result<Arc<dyn Session>, SessionError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if let Some(error) = self.rejection.lock().take() {
            return Err(error);
        }

        let session = Arc::new(MockSession::new(self.users.lock().clone()));
        self.sessions.lock().push(session.clone());
        Ok(session as Arc<dyn Session>)
    }
}

pub struct MockPushPlatform {
    responsibility: Mutex<PushResponsibility>,
    displayed: Mutex<Vec<DisplayRequest>>,
    tokens: Mutex<Vec<Vec<u8>>>,
    fail_display: AtomicBool,
    classify_calls: AtomicUsize,
}

impl MockPushPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responsibility: Mutex::new(PushResponsibility::MessagingShouldDisplay),
            displayed: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
            fail_display: AtomicBool::new(false),
            classify_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_responsibility(&self, responsibility: PushResponsibility) {
        *self.responsibility.lock() = responsibility;
    }

    pub fn fail_display(&self, fail: bool) {
        self.fail_display.store(fail, Ordering::SeqCst);
    }

    pub fn displayed(&self) -> Vec<DisplayRequest> {
        self.displayed.lock().clone()
    }

    pub fn tokens(&self) -> Vec<Vec<u8>> {
        self.tokens.lock().clone()
    }

    pub fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }
}

impl PushPlatform for MockPushPlatform {
    fn should_be_displayed(&self, _payload: &NotificationPayload) -> PushResponsibility {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        self.responsibility.lock().clone()
    }

    fn display_notification(&self, request: &DisplayRequest) -> Result<(), SessionError> {
        if self.fail_display.load(Ordering::SeqCst) {
            return Err(SessionError::other("notification channel disabled"));
        }
        self.displayed.lock().push(request.clone());
        Ok(())
    }

    fn update_push_notification_token(&self, token: &[u8]) {
        self.tokens.lock().push(token.to_vec());
    }
}

#[derive(Default)]
pub struct MockPresentationHost {
    presented: Mutex<Vec<ViewTarget>>,
    failure: Mutex<Option<String>>,
}

impl MockPresentationHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next presentation with `reason`
    pub fn fail_next(&self, reason: &str) {
        *self.failure.lock() = Some(reason.to_string());
    }

    pub fn presented(&self) -> Vec<ViewTarget> {
        self.presented.lock().clone()
    }
}

impl PresentationHost for MockPresentationHost {
    fn present(&self, target: &ViewTarget) -> Result<(), String> {
        if let Some(reason) = self.failure.lock().take() {
            return Err(reason);
        }
        self.presented.lock().push(target.clone());
        Ok(())
    }
}
