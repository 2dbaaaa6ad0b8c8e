//! Main messaging interface for FFI

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use parley_sdk::{LifecycleManager, PresentationHost, TapOutcome};

use crate::{
    config::{InitializeConfig, MessagingConfig},
    error::ParleyFfiError,
    events::{EventType, LifecycleState, MessagingEventListener, MessagingUser, NotificationResponsibility, Subscription},
    helpers::get_runtime,
    native::{
        NativeHostAdapter, NativeMessagingSdk, NativePresentationHost, NativePushAdapter, NativePushPlatform,
        NativeSessionFactory,
    },
};

/// Messaging bridge handle for FFI consumers
///
/// Owns the one messaging session of the app. Create it once at startup and
/// keep it for the process lifetime.
#[derive(uniffi::Object)]
pub struct ParleyMessaging {
    manager: LifecycleManager,
}

/// Every FFI entry logs at debug level so traces show whether a call reached Rust
macro_rules! ffi_log {
    ($name:expr) => {
        debug!("parley messaging->{}()", $name);
    };
}

impl ParleyMessaging {
    fn build(
        config: MessagingConfig,
        sdk: Box<dyn NativeMessagingSdk>,
        push: Option<Box<dyn NativePushPlatform>>,
        host: Box<dyn NativePresentationHost>,
    ) -> Result<Arc<Self>, ParleyFfiError> {
        let config = config.into_core()?;
        let factory = NativeSessionFactory::new(Arc::from(sdk), config.event_channel_capacity);

        let mut builder = LifecycleManager::builder(Arc::new(factory))
            .config(config)
            .presentation_host(Arc::new(NativeHostAdapter::new(host)))
            .runtime(get_runtime().handle().clone());
        if let Some(push) = push {
            builder = builder.push_platform(Arc::new(NativePushAdapter::new(push)));
        }

        let manager = builder.build()?;
        info!("✅ Messaging bridge created ({})", parley_sdk::version::user_agent());
        Ok(Arc::new(Self { manager }))
    }
}

#[uniffi::export(async_runtime = "tokio")]
impl ParleyMessaging {
    /// Bridge for platforms without a native push transport
    #[uniffi::constructor]
    pub fn new(
        config: MessagingConfig,
        sdk: Box<dyn NativeMessagingSdk>,
        host: Box<dyn NativePresentationHost>,
    ) -> Result<Arc<Self>, ParleyFfiError> {
        ffi_log!("new");
        Self::build(config, sdk, None, host)
    }

    #[uniffi::constructor]
    pub fn with_push_platform(
        config: MessagingConfig,
        sdk: Box<dyn NativeMessagingSdk>,
        push: Box<dyn NativePushPlatform>,
        host: Box<dyn NativePresentationHost>,
    ) -> Result<Arc<Self>, ParleyFfiError> {
        ffi_log!("with_push_platform");
        Self::build(config, sdk, Some(push), host)
    }

    pub async fn initialize(&self, config: InitializeConfig) -> Result<(), ParleyFfiError> {
        ffi_log!("initialize");
        self.manager.initialize(config.into()).await?;
        Ok(())
    }

    pub fn reset(&self) {
        ffi_log!("reset");
        self.manager.reset();
    }

    pub async fn login_user(&self, token: String) -> Result<MessagingUser, ParleyFfiError> {
        ffi_log!("login_user");
        let user = self.manager.login_user(&token).await?;
        Ok(user.into())
    }

    pub async fn logout_user(&self) -> Result<(), ParleyFfiError> {
        ffi_log!("logout_user");
        self.manager.logout_user().await?;
        Ok(())
    }

    pub async fn open_messaging_view(&self) -> Result<(), ParleyFfiError> {
        ffi_log!("open_messaging_view");
        self.manager.open_messaging_view().await?;
        Ok(())
    }

    /// 0 whenever no session is ready
    pub async fn get_unread_message_count(&self) -> u32 {
        ffi_log!("get_unread_message_count");
        self.manager.get_unread_message_count().await
    }

    pub fn update_push_notification_token(&self, token: String) -> Result<(), ParleyFfiError> {
        ffi_log!("update_push_notification_token");
        self.manager.update_push_notification_token(&token)?;
        Ok(())
    }

    /// Classify an inbound push; messaging pushes that should show are displayed
    pub fn handle_notification(&self, payload: HashMap<String, String>) -> NotificationResponsibility {
        ffi_log!("handle_notification");
        self.manager.handle_notification(&payload).into()
    }

    /// Route a notification tap; deferred until ready when needed
    pub fn handle_notification_click(&self, payload: HashMap<String, String>) {
        ffi_log!("handle_notification_click");
        match self.manager.handle_notification_click(payload) {
            TapOutcome::Presented(target) => debug!("Notification tap presented {:?}", target),
            TapOutcome::Deferred => debug!("Notification tap deferred until ready"),
            TapOutcome::Ignored => debug!("Notification tap ignored"),
        }
    }

    pub fn add_event_listener(
        &self,
        event_type: EventType,
        listener: Box<dyn MessagingEventListener>,
    ) -> Arc<Subscription> {
        ffi_log!("add_event_listener");
        let subscription = self
            .manager
            .add_event_listener(event_type.into(), move |event| listener.on_event(event.clone().into()));
        Arc::new(Subscription::new(subscription))
    }

    pub fn remove_subscription(&self, subscription: Arc<Subscription>) {
        ffi_log!("remove_subscription");
        self.manager.remove_subscription(subscription.inner());
    }

    pub fn remove_all_listeners(&self, event_type: EventType) {
        ffi_log!("remove_all_listeners");
        self.manager.remove_all_listeners(event_type.into());
    }

    pub fn listener_count(&self, event_type: EventType) -> u32 {
        let count = self.manager.event_bridge().listener_count(event_type.into());
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Swap the UI host, e.g. after the foreground activity changed
    pub fn set_presentation_host(&self, host: Box<dyn NativePresentationHost>) {
        ffi_log!("set_presentation_host");
        let host: Arc<dyn PresentationHost> = Arc::new(NativeHostAdapter::new(host));
        self.manager.set_presentation_host(Some(host));
    }

    pub fn clear_presentation_host(&self) {
        ffi_log!("clear_presentation_host");
        self.manager.set_presentation_host(None);
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.manager.state().into()
    }

    pub fn current_user(&self) -> Option<MessagingUser> {
        self.manager.current_user().map(Into::into)
    }

    pub fn config(&self) -> MessagingConfig {
        self.manager.config().clone().into()
    }
}
