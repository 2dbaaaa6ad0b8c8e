//! Push responsibility resolution
//!
//! Decides whether an inbound push belongs to the messaging SDK and whether it
//! should be shown, and holds the single pending tap that arrives before the
//! session is ready.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ParleyConfig;
use crate::session::{PushPlatform, PushResponsibility};

/// Key/value data delivered by the push transport
pub type NotificationPayload = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponsibilityVerdict {
    #[serde(rename = "MESSAGING_SHOULD_DISPLAY")]
    MessagingShouldDisplay,
    #[serde(rename = "MESSAGING_SHOULD_NOT_DISPLAY")]
    MessagingShouldNotDisplay,
    #[serde(rename = "NOT_FROM_MESSAGING")]
    NotFromMessaging,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl ResponsibilityVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponsibilityVerdict::MessagingShouldDisplay => "MESSAGING_SHOULD_DISPLAY",
            ResponsibilityVerdict::MessagingShouldNotDisplay => "MESSAGING_SHOULD_NOT_DISPLAY",
            ResponsibilityVerdict::NotFromMessaging => "NOT_FROM_MESSAGING",
            ResponsibilityVerdict::Unknown => "UNKNOWN",
        }
    }

    /// Callers apply their own default handling (fail open on `Unknown`)
    pub fn is_foreign(&self) -> bool {
        matches!(
            self,
            ResponsibilityVerdict::NotFromMessaging | ResponsibilityVerdict::Unknown
        )
    }

    pub fn should_display(&self) -> bool {
        matches!(self, ResponsibilityVerdict::MessagingShouldDisplay)
    }
}

impl fmt::Display for ResponsibilityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PushResponsibility> for ResponsibilityVerdict {
    fn from(responsibility: PushResponsibility) -> Self {
        match responsibility {
            PushResponsibility::MessagingShouldDisplay => ResponsibilityVerdict::MessagingShouldDisplay,
            PushResponsibility::MessagingShouldNotDisplay => ResponsibilityVerdict::MessagingShouldNotDisplay,
            PushResponsibility::NotFromMessaging => ResponsibilityVerdict::NotFromMessaging,
            PushResponsibility::Unrecognized(raw) => {
                warn!("Unrecognized push responsibility from SDK: {}", raw);
                ResponsibilityVerdict::Unknown
            }
        }
    }
}

/// System notification to render for a messaging push
///
/// Only built for [`ResponsibilityVerdict::MessagingShouldDisplay`]; the tap
/// payload is what the platform hands back on user interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tap_payload: NotificationPayload,
}

pub struct NotificationResolver {
    signature_keys: Vec<String>,
    title_key: String,
    body_key: String,
    push: Option<Arc<dyn PushPlatform>>,
    /// Last tap received before the session was ready
    pending_tap: Mutex<Option<NotificationPayload>>,
}

impl NotificationResolver {
    pub fn new(config: &ParleyConfig, push: Option<Arc<dyn PushPlatform>>) -> Self {
        Self {
            signature_keys: config.signature_keys.clone(),
            title_key: config.title_key.clone(),
            body_key: config.body_key.clone(),
            push,
            pending_tap: Mutex::new(None),
        }
    }

    pub fn push_platform(&self) -> Option<&Arc<dyn PushPlatform>> {
        self.push.as_ref()
    }

    pub fn carries_signature(&self, payload: &NotificationPayload) -> bool {
        self.signature_keys.iter().all(|key| payload.contains_key(key))
    }

    /// Classify a payload without side effects
    pub fn resolve(&self, payload: &NotificationPayload) -> ResponsibilityVerdict {
        if !self.carries_signature(payload) {
            return ResponsibilityVerdict::NotFromMessaging;
        }
        match &self.push {
            Some(push) => push.should_be_displayed(payload).into(),
            None => {
                debug!("No push transport on this platform, verdict is UNKNOWN");
                ResponsibilityVerdict::Unknown
            }
        }
    }

    /// Resolve and, for `MessagingShouldDisplay` only, render the notification
    pub fn handle_notification(&self, payload: &NotificationPayload) -> ResponsibilityVerdict {
        let verdict = self.resolve(payload);
        debug!("Push resolved as {}", verdict);

        if verdict.should_display() {
            if let Some(push) = &self.push {
                let request = self.display_request(payload);
                if let Err(e) = push.display_notification(&request) {
                    warn!("⚠️ Failed to display messaging notification: {}", e);
                }
            }
        }
        verdict
    }

    fn display_request(&self, payload: &NotificationPayload) -> DisplayRequest {
        DisplayRequest {
            title: payload.get(&self.title_key).cloned(),
            body: payload.get(&self.body_key).cloned(),
            tap_payload: payload.clone(),
        }
    }

    /// Keep a tap for replay; a later tap overwrites an earlier one
    pub fn retain_tap(&self, payload: NotificationPayload) {
        let replaced = self.pending_tap.lock().replace(payload).is_some();
        if replaced {
            info!("Pending notification tap replaced by a newer one");
        } else {
            info!("Notification tap held until the session is ready");
        }
    }

    pub fn take_pending_tap(&self) -> Option<NotificationPayload> {
        self.pending_tap.lock().take()
    }

    pub fn discard_pending_tap(&self) {
        if self.pending_tap.lock().take().is_some() {
            info!("Discarded pending notification tap");
        }
    }

    pub fn has_pending_tap(&self) -> bool {
        self.pending_tap.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{messaging_payload, MockPushPlatform};

    fn resolver_with(push: &Arc<MockPushPlatform>) -> NotificationResolver {
        NotificationResolver::new(&ParleyConfig::default(), Some(push.clone() as Arc<dyn PushPlatform>))
    }

    #[test]
    fn payload_without_signature_is_foreign() {
        let push = MockPushPlatform::new();
        let resolver = resolver_with(&push);

        let payload = NotificationPayload::from([("foo".to_string(), "bar".to_string())]);
        assert_eq!(resolver.handle_notification(&payload), ResponsibilityVerdict::NotFromMessaging);

        // Only one of the two signature keys
        let payload = NotificationPayload::from([("conversation_id".to_string(), "c1".to_string())]);
        assert_eq!(resolver.resolve(&payload), ResponsibilityVerdict::NotFromMessaging);

        assert!(push.displayed().is_empty());
        assert_eq!(push.classify_calls(), 0);
    }

    #[test]
    fn suppressed_push_is_not_displayed() {
        let push = MockPushPlatform::new();
        push.set_responsibility(PushResponsibility::MessagingShouldNotDisplay);
        let resolver = resolver_with(&push);

        let verdict = resolver.handle_notification(&messaging_payload("c1"));
        assert_eq!(verdict, ResponsibilityVerdict::MessagingShouldNotDisplay);
        assert!(!verdict.is_foreign());
        assert!(push.displayed().is_empty());
    }

    #[test]
    fn displayable_push_is_rendered_with_title_and_body() {
        let push = MockPushPlatform::new();
        let resolver = resolver_with(&push);

        let payload = messaging_payload("c1");
        assert_eq!(resolver.handle_notification(&payload), ResponsibilityVerdict::MessagingShouldDisplay);

        let displayed = push.displayed();
        assert_eq!(displayed.len(), 1);
        assert_eq!(displayed[0].title.as_deref(), Some("New message"));
        assert_eq!(displayed[0].body.as_deref(), Some("Hello from support"));
        assert_eq!(displayed[0].tap_payload, payload);
    }

    #[test]
    fn resolve_alone_has_no_display_side_effect() {
        let push = MockPushPlatform::new();
        let resolver = resolver_with(&push);

        assert_eq!(resolver.resolve(&messaging_payload("c1")), ResponsibilityVerdict::MessagingShouldDisplay);
        assert!(push.displayed().is_empty());
    }

    #[test]
    fn unrecognized_sdk_result_fails_open() {
        let push = MockPushPlatform::new();
        push.set_responsibility(PushResponsibility::Unrecognized("MESSAGING_SHOULD_BUZZ".into()));
        let resolver = resolver_with(&push);

        let verdict = resolver.handle_notification(&messaging_payload("c1"));
        assert_eq!(verdict, ResponsibilityVerdict::Unknown);
        assert!(verdict.is_foreign());
        assert!(push.displayed().is_empty());
    }

    #[test]
    fn display_failure_still_returns_verdict() {
        let push = MockPushPlatform::new();
        push.fail_display(true);
        let resolver = resolver_with(&push);

        assert_eq!(
            resolver.handle_notification(&messaging_payload("c1")),
            ResponsibilityVerdict::MessagingShouldDisplay
        );
    }

    #[test]
    fn no_push_transport_yields_unknown() {
        let resolver = NotificationResolver::new(&ParleyConfig::default(), None);
        assert_eq!(resolver.handle_notification(&messaging_payload("c1")), ResponsibilityVerdict::Unknown);
    }

    #[test]
    fn pending_tap_is_last_wins_single_slot() {
        let resolver = NotificationResolver::new(&ParleyConfig::default(), None);
        resolver.retain_tap(messaging_payload("first"));
        resolver.retain_tap(messaging_payload("second"));

        let tap = resolver.take_pending_tap().unwrap();
        assert_eq!(tap.get("conversation_id").map(String::as_str), Some("second"));
        assert!(resolver.take_pending_tap().is_none());

        resolver.retain_tap(messaging_payload("third"));
        resolver.discard_pending_tap();
        assert!(!resolver.has_pending_tap());
    }

    #[test]
    fn verdict_wire_names() {
        assert_eq!(
            serde_json::to_string(&ResponsibilityVerdict::MessagingShouldNotDisplay).unwrap(),
            "\"MESSAGING_SHOULD_NOT_DISPLAY\""
        );
        assert_eq!(ResponsibilityVerdict::Unknown.to_string(), "UNKNOWN");
    }
}
