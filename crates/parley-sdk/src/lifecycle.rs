//! Session lifecycle management
//!
//! `LifecycleManager` owns the one live [`Session`] and gates every operation
//! on the lifecycle state:
//!
//! ```text
//! Uninitialized --initialize--> Initializing --ok--> Ready --reset--> Resetting --> Uninitialized
//!                                    |  failure                                        ^
//!                                    +-------------------------------------------------+
//! ```
//!
//! Each `initialize` attempt and each `reset` bumps a generation number. A
//! session creation that settles after its generation was superseded is
//! invalidated on the spot and never becomes visible.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::config::{InitializeOptions, ParleyConfig};
use crate::error::{require_non_empty, ParleyError, Result};
use crate::events::{EventBridge, EventType, MessagingEvent, Subscription};
use crate::notification::{NotificationPayload, NotificationResolver, ResponsibilityVerdict};
use crate::session::{PresentationHost, PushPlatform, Session, SessionErrorKind, SessionFactory, User, ViewTarget};

mod push_token;

use push_token::{decode_token, PushTokenSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
    Resetting,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initializing => "initializing",
            LifecycleState::Ready => "ready",
            LifecycleState::Resetting => "resetting",
        };
        f.write_str(name)
    }
}

/// What happened to a notification tap
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapOutcome {
    /// Routed to a conversation view
    Presented(ViewTarget),
    /// Held until the session becomes ready
    Deferred,
    /// Nothing to route to, or no host to present on
    Ignored,
}

struct Inner {
    state: LifecycleState,
    generation: u64,
    session: Option<Arc<dyn Session>>,
    channel_key: Option<String>,
    user: Option<User>,
    push_token: PushTokenSlot,
}

impl Inner {
    fn ready_session(&self) -> Option<(Arc<dyn Session>, u64)> {
        match (self.state, &self.session) {
            (LifecycleState::Ready, Some(session)) => Some((session.clone(), self.generation)),
            _ => None,
        }
    }

    /// Mark a token delivered; `None` when it already was
    fn claim_delivery(&mut self, token: Vec<u8>) -> Option<Vec<u8>> {
        if !self.push_token.needs_delivery(&token) {
            debug!("Push token unchanged, skipping update");
            return None;
        }
        self.push_token.mark_delivered(token.clone());
        Some(token)
    }
}

pub struct LifecycleManager {
    config: ParleyConfig,
    factory: Arc<dyn SessionFactory>,
    host: RwLock<Option<Arc<dyn PresentationHost>>>,
    resolver: NotificationResolver,
    bridge: EventBridge,
    inner: Mutex<Inner>,
    runtime: Handle,
}

pub struct LifecycleManagerBuilder {
    factory: Arc<dyn SessionFactory>,
    config: ParleyConfig,
    push: Option<Arc<dyn PushPlatform>>,
    host: Option<Arc<dyn PresentationHost>>,
    runtime: Option<Handle>,
}

impl LifecycleManagerBuilder {
    pub fn config(mut self, config: ParleyConfig) -> Self {
        self.config = config;
        self
    }

    /// Leave unset on platforms without a native push transport
    pub fn push_platform(mut self, push: Arc<dyn PushPlatform>) -> Self {
        self.push = Some(push);
        self
    }

    pub fn presentation_host(mut self, host: Arc<dyn PresentationHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Runtime the event bridge task runs on; defaults to the current one
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<LifecycleManager> {
        self.config.validate()?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current()
                .map_err(|e| ParleyError::unexpected(format!("no tokio runtime available: {}", e)))?,
        };

        Ok(LifecycleManager {
            resolver: NotificationResolver::new(&self.config, self.push),
            config: self.config,
            factory: self.factory,
            host: RwLock::new(self.host),
            bridge: EventBridge::new(),
            inner: Mutex::new(Inner {
                state: LifecycleState::Uninitialized,
                generation: 0,
                session: None,
                channel_key: None,
                user: None,
                push_token: PushTokenSlot::default(),
            }),
            runtime,
        })
    }
}

impl LifecycleManager {
    pub fn builder(factory: Arc<dyn SessionFactory>) -> LifecycleManagerBuilder {
        LifecycleManagerBuilder {
            factory,
            config: ParleyConfig::default(),
            push: None,
            host: None,
            runtime: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.lock().user.clone()
    }

    pub fn channel_key(&self) -> Option<String> {
        self.inner.lock().channel_key.clone()
    }

    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    pub fn event_bridge(&self) -> &EventBridge {
        &self.bridge
    }

    pub fn resolver(&self) -> &NotificationResolver {
        &self.resolver
    }

    /// Swap the UI host, e.g. when the foreground surface changes
    pub fn set_presentation_host(&self, host: Option<Arc<dyn PresentationHost>>) {
        *self.host.write() = host;
    }

    /// Create the session for `options.channel_key`
    ///
    /// Only valid from `Uninitialized`; concurrent or repeated calls are
    /// rejected with `BusyError` instead of being queued.
    pub async fn initialize(&self, options: InitializeOptions) -> Result<()> {
        require_non_empty("channel_key", &options.channel_key)?;

        let generation = {
            let mut inner = self.inner.lock();
            if inner.state != LifecycleState::Uninitialized {
                warn!("initialize rejected, session is {}", inner.state);
                return Err(ParleyError::Busy { state: inner.state });
            }
            inner.state = LifecycleState::Initializing;
            inner.generation += 1;
            inner.generation
        };
        info!("🔄 Initializing session #{}", generation);

        let created = self.factory.create(&options.channel_key).await;

        let (session, pending_tap, pending_token) = {
            let mut inner = self.inner.lock();
            let current = inner.generation == generation && inner.state == LifecycleState::Initializing;

            let session = match created {
                Ok(session) if current => session,
                Ok(session) => {
                    drop(inner);
                    warn!("Session #{} settled after reset, invalidating it", generation);
                    session.invalidate();
                    return Err(ParleyError::initialization("superseded by reset"));
                }
                Err(e) => {
                    if current {
                        inner.state = LifecycleState::Uninitialized;
                    }
                    warn!("❌ Session #{} failed to initialize: {}", generation, e);
                    return Err(ParleyError::initialization(e));
                }
            };

            let receiver = session.subscribe_events();
            inner.state = LifecycleState::Ready;
            inner.session = Some(session.clone());
            inner.channel_key = Some(options.channel_key.clone());
            self.bridge.attach(generation, receiver, &self.runtime);

            let pending_tap = self.resolver.take_pending_tap();
            let pending_token = match inner.push_token.take_pending() {
                Some(token) => inner.claim_delivery(token),
                None => None,
            };
            (session, pending_tap, pending_token)
        };
        info!("✅ Session #{} ready", generation);

        if let Some(token) = pending_token {
            self.deliver_push_token(&token);
        }

        if !self.is_current(generation) {
            warn!("Session #{} was reset before it could be presented", generation);
            return Err(ParleyError::initialization("superseded by reset"));
        }

        match pending_tap {
            Some(payload) => {
                info!("Replaying notification tap received before ready");
                self.route_tap(session.as_ref(), &payload);
            }
            None if !options.skip_open_messaging => {
                if let Err(e) = self.present_messaging(session.as_ref()) {
                    warn!("⚠️ Could not open messaging after initialize: {}", e);
                }
            }
            None => {}
        }
        Ok(())
    }

    /// Invalidate the session and return to `Uninitialized`. Safe in any state.
    pub fn reset(&self) {
        let (session, generation) = {
            let mut inner = self.inner.lock();
            let previous = inner.state;
            inner.state = LifecycleState::Resetting;
            inner.generation += 1;
            inner.user = None;
            inner.channel_key = None;
            inner.push_token.rearm();
            self.bridge.detach();
            self.resolver.discard_pending_tap();
            debug!("Resetting from {}", previous);
            (inner.session.take(), inner.generation)
        };

        if let Some(session) = session {
            session.invalidate();
        }

        // A concurrent reset may have moved on already
        let mut inner = self.inner.lock();
        if inner.generation == generation && inner.state == LifecycleState::Resetting {
            inner.state = LifecycleState::Uninitialized;
        }
        info!("Session reset");
    }

    pub async fn login_user(&self, token: &str) -> Result<User> {
        require_non_empty("token", token)?;
        let (session, generation) = self.ready_session("login_user")?;

        let user = session
            .login_user(token)
            .await
            .map_err(ParleyError::authentication)?;

        let mut inner = self.inner.lock();
        if inner.generation == generation {
            inner.user = Some(user.clone());
        }
        info!("✅ User logged in: id={}", user.id);
        Ok(user)
    }

    /// Resolves successfully when nobody is logged in
    pub async fn logout_user(&self) -> Result<()> {
        let Some((session, generation)) = self.inner.lock().ready_session() else {
            debug!("No ready session, nothing to log out");
            return Ok(());
        };

        match session.logout_user().await {
            Ok(()) => {}
            Err(e) if e.kind == SessionErrorKind::Unavailable => {
                debug!("SDK reports no active user: {}", e);
            }
            Err(e) => return Err(ParleyError::logout(e)),
        }

        let mut inner = self.inner.lock();
        if inner.generation == generation {
            inner.user = None;
        }
        info!("User logged out");
        Ok(())
    }

    pub async fn open_messaging_view(&self) -> Result<()> {
        let (session, _) = self.ready_session("open_messaging_view")?;
        self.present_messaging(session.as_ref())
    }

    /// Never fails: 0 when not ready or when no count is known
    pub async fn get_unread_message_count(&self) -> u32 {
        let Some((session, _)) = self.inner.lock().ready_session() else {
            return 0;
        };

        let fallback = || self.bridge.last_unread_count().unwrap_or(0);
        match tokio::time::timeout(self.config.unread_count_timeout(), session.unread_message_count()).await {
            Ok(Some(count)) => count,
            Ok(None) => fallback(),
            Err(_) => {
                warn!(
                    "Unread count query timed out after {}ms, using last known value",
                    self.config.unread_count_timeout_ms
                );
                fallback()
            }
        }
    }

    /// Register the device push token; held until ready when called early
    pub fn update_push_notification_token(&self, token: &str) -> Result<()> {
        require_non_empty("token", token)?;
        if self.resolver.push_platform().is_none() {
            debug!("No push transport on this platform, ignoring token");
            return Ok(());
        }
        let Some(bytes) = decode_token(token, self.config.push_token_encoding) else {
            return Ok(());
        };

        let token = {
            let mut inner = self.inner.lock();
            if inner.state != LifecycleState::Ready {
                debug!("Session not ready, holding push token");
                inner.push_token.hold(bytes);
                return Ok(());
            }
            inner.claim_delivery(bytes)
        };
        if let Some(token) = token {
            self.deliver_push_token(&token);
        }
        Ok(())
    }

    fn deliver_push_token(&self, token: &[u8]) {
        if let Some(push) = self.resolver.push_platform() {
            push.update_push_notification_token(token);
            info!("✅ Push notification token updated");
        }
    }

    /// Classify an inbound push and display it when it is ours to show
    pub fn handle_notification(&self, payload: &NotificationPayload) -> ResponsibilityVerdict {
        self.resolver.handle_notification(payload)
    }

    /// Route a user's tap on a displayed notification
    pub fn handle_notification_click(&self, payload: NotificationPayload) -> TapOutcome {
        if self.resolver.push_platform().is_none() {
            debug!("No push transport on this platform, ignoring notification tap");
            return TapOutcome::Ignored;
        }
        if !self.resolver.carries_signature(&payload) {
            debug!("Tapped notification is not from messaging, ignoring");
            return TapOutcome::Ignored;
        }

        let session = {
            let inner = self.inner.lock();
            match inner.ready_session() {
                Some((session, _)) => session,
                None => {
                    self.resolver.retain_tap(payload);
                    return TapOutcome::Deferred;
                }
            }
        };
        self.route_tap(session.as_ref(), &payload)
    }

    pub fn add_event_listener<F>(&self, event_type: EventType, listener: F) -> Subscription
    where
        F: Fn(&MessagingEvent) + Send + Sync + 'static,
    {
        self.bridge.add_event_listener(event_type, listener)
    }

    pub fn remove_subscription(&self, subscription: &Subscription) {
        self.bridge.remove_subscription(subscription);
    }

    pub fn remove_all_listeners(&self, event_type: EventType) {
        self.bridge.remove_all_listeners(event_type);
    }

    fn ready_session(&self, operation: &str) -> Result<(Arc<dyn Session>, u64)> {
        let inner = self.inner.lock();
        inner.ready_session().ok_or_else(|| {
            debug!("{} rejected, session is {}", operation, inner.state);
            ParleyError::unreachable(operation)
        })
    }

    fn is_current(&self, generation: u64) -> bool {
        let inner = self.inner.lock();
        inner.generation == generation && inner.state == LifecycleState::Ready
    }

    fn route_tap(&self, session: &dyn Session, payload: &NotificationPayload) -> TapOutcome {
        let Some(target) = session.resolve_tap(payload) else {
            debug!("SDK produced no view for the tapped notification");
            return TapOutcome::Ignored;
        };
        match self.present(&target) {
            Ok(()) => TapOutcome::Presented(target),
            Err(e) => {
                warn!("⚠️ Could not route notification tap: {}", e);
                TapOutcome::Ignored
            }
        }
    }

    fn present_messaging(&self, session: &dyn Session) -> Result<()> {
        let target = session
            .messaging_target()
            .ok_or_else(|| ParleyError::presentation("cannot get messaging view"))?;
        self.present(&target)
    }

    fn present(&self, target: &ViewTarget) -> Result<()> {
        let host = self
            .host
            .read()
            .clone()
            .ok_or_else(|| ParleyError::presentation("no UI host available"))?;
        host.present(target).map_err(ParleyError::presentation)?;
        debug!("Presented {:?}", target);
        Ok(())
    }
}

impl Drop for LifecycleManager {
    fn drop(&mut self) {
        if let Some(session) = self.inner.get_mut().session.take() {
            session.invalidate();
        }
    }
}
