//! Push token bookkeeping
//!
//! Push delivery can race app startup, so a token handed over before the
//! session is ready is held and flushed once it is.

use crate::config::PushTokenEncoding;
use tracing::warn;

/// Decode a token string into the bytes the push transport expects
///
/// `None` when a hex token is malformed.
pub(crate) fn decode_token(token: &str, encoding: PushTokenEncoding) -> Option<Vec<u8>> {
    match encoding {
        PushTokenEncoding::Raw => Some(token.as_bytes().to_vec()),
        PushTokenEncoding::Hex => match hex::decode(token.trim()) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Failed to convert token string to bytes: {}", e);
                None
            }
        },
    }
}

#[derive(Debug, Default)]
pub(crate) struct PushTokenSlot {
    pending: Option<Vec<u8>>,
    delivered: Option<Vec<u8>>,
}

impl PushTokenSlot {
    /// Hold a token until the next ready session
    pub fn hold(&mut self, token: Vec<u8>) {
        self.pending = Some(token);
    }

    /// Whether this token still needs delivering
    pub fn needs_delivery(&self, token: &[u8]) -> bool {
        self.delivered.as_deref() != Some(token)
    }

    pub fn mark_delivered(&mut self, token: Vec<u8>) {
        self.pending = None;
        self.delivered = Some(token);
    }

    pub fn take_pending(&mut self) -> Option<Vec<u8>> {
        self.pending.take()
    }

    /// Session went away; the device token must be handed to the next one
    pub fn rearm(&mut self) {
        if let Some(token) = self.delivered.take() {
            self.pending.get_or_insert(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_tokens_are_decoded() {
        assert_eq!(decode_token("0aff10", PushTokenEncoding::Hex), Some(vec![0x0a, 0xff, 0x10]));
        assert_eq!(decode_token("zz", PushTokenEncoding::Hex), None);
        assert_eq!(decode_token("abc", PushTokenEncoding::Hex), None);
    }

    #[test]
    fn raw_tokens_pass_through() {
        assert_eq!(decode_token("fcm:token", PushTokenEncoding::Raw), Some(b"fcm:token".to_vec()));
    }

    #[test]
    fn delivered_token_is_not_resent_until_rearmed() {
        let mut slot = PushTokenSlot::default();
        slot.hold(b"t1".to_vec());
        let token = slot.take_pending().unwrap();
        slot.mark_delivered(token);

        assert!(!slot.needs_delivery(b"t1"));
        assert!(slot.needs_delivery(b"t2"));
        assert!(slot.take_pending().is_none());

        slot.rearm();
        assert_eq!(slot.take_pending(), Some(b"t1".to_vec()));
    }

    #[test]
    fn newer_pending_token_survives_rearm() {
        let mut slot = PushTokenSlot::default();
        slot.mark_delivered(b"old".to_vec());
        slot.hold(b"new".to_vec());
        slot.rearm();
        assert_eq!(slot.take_pending(), Some(b"new".to_vec()));
    }
}
