//! Parley SDK - lifecycle bridge for an embedded messaging SDK
//!
//! Wraps a third-party customer-messaging SDK behind one uniform surface for
//! the host application:
//! - 🔄 session lifecycle: initialize, reset, login, logout
//! - 🔔 push responsibility: decide whether a push is ours and display it
//! - 👆 notification taps, held until the session is ready
//! - 📡 event bridge: normalized events fanned out to registered listeners
//!
//! The SDK itself is reached only through the traits in [`session`]; each
//! platform plugs its native objects in there.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use parley_sdk::{EventType, InitializeOptions, LifecycleManager, SessionFactory};
//!
//! async fn run(factory: Arc<dyn SessionFactory>) -> parley_sdk::Result<()> {
//!     let manager = LifecycleManager::builder(factory).build()?;
//!
//!     let subscription = manager.add_event_listener(EventType::UnreadMessageCountChanged, |event| {
//!         println!("unread: {}", event.payload());
//!     });
//!
//!     manager.initialize(InitializeOptions::new("channel-key")).await?;
//!     let user = manager.login_user("jwt").await?;
//!     println!("logged in as {}", user.id);
//!
//!     subscription.remove();
//!     manager.logout_user().await?;
//!     manager.reset();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod notification;
pub mod session;
pub mod version;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{InitializeOptions, ParleyConfig, ParleyConfigBuilder, PushTokenEncoding};
pub use error::{ParleyError, Result};
pub use events::{ConnectionStatus, EventBridge, EventStats, EventType, MessagingEvent, Subscription};
pub use lifecycle::{LifecycleManager, LifecycleManagerBuilder, LifecycleState, TapOutcome};
pub use notification::{DisplayRequest, NotificationPayload, NotificationResolver, ResponsibilityVerdict};
pub use session::{
    PresentationHost, PushPlatform, PushResponsibility, SdkEvent, Session, SessionError, SessionErrorKind,
    SessionFactory, User, ViewTarget,
};
pub use version::SDK_VERSION;
