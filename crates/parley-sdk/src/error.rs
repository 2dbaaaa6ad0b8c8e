//! Error taxonomy for the messaging bridge
//!
//! Every variant maps to a stable category code (see [`ParleyError::code`]) so
//! that bindings can reject with the same code on every platform, while the
//! message keeps the underlying cause for diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lifecycle::LifecycleState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ParleyError {
    /// The SDK rejected the channel key or config retrieval failed
    #[error("initialization failed: {cause}")]
    Initialization { cause: String },

    /// Token rejected or expired
    #[error("authentication failed: {reason}")]
    Authentication { reason: String },

    #[error("logout failed: {cause}")]
    Logout { cause: String },

    /// No UI host or no messaging view available
    #[error("presentation failed: {reason}")]
    Presentation { reason: String },

    /// Malformed caller input, raised before the SDK is contacted
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// A lifecycle transition is already in progress or the session already exists
    #[error("lifecycle busy: session is {state}")]
    Busy { state: LifecycleState },

    /// Operation requires a ready session
    #[error("{operation} requires a ready session")]
    Unreachable { operation: String },

    #[error("unexpected error: {message}")]
    Unexpected { message: String },
}

impl ParleyError {
    /// Stable category code surfaced to callers
    pub fn code(&self) -> &'static str {
        match self {
            ParleyError::Initialization { .. } => "InitializationError",
            ParleyError::Authentication { .. } => "AuthenticationError",
            ParleyError::Logout { .. } => "LogoutError",
            ParleyError::Presentation { .. } => "PresentationError",
            ParleyError::Validation { .. } => "ValidationError",
            ParleyError::Busy { .. } => "BusyError",
            ParleyError::Unreachable { .. } => "UnreachableError",
            ParleyError::Unexpected { .. } => "UnexpectedError",
        }
    }

    pub fn initialization<T: fmt::Display>(cause: T) -> Self {
        Self::Initialization { cause: cause.to_string() }
    }

    pub fn authentication<T: fmt::Display>(reason: T) -> Self {
        Self::Authentication { reason: reason.to_string() }
    }

    pub fn logout<T: fmt::Display>(cause: T) -> Self {
        Self::Logout { cause: cause.to_string() }
    }

    pub fn presentation<T: fmt::Display>(reason: T) -> Self {
        Self::Presentation { reason: reason.to_string() }
    }

    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn unreachable(operation: &str) -> Self {
        Self::Unreachable { operation: operation.to_string() }
    }

    pub fn unexpected<T: fmt::Display>(message: T) -> Self {
        Self::Unexpected { message: message.to_string() }
    }

    /// True when the caller passed bad input and retrying unchanged cannot help
    pub fn is_validation(&self) -> bool {
        matches!(self, ParleyError::Validation { .. })
    }
}

pub type Result<T> = std::result::Result<T, ParleyError>;

/// Reject empty or whitespace-only string input
pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ParleyError::validation(field, "must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ParleyError::initialization("x").code(), "InitializationError");
        assert_eq!(ParleyError::authentication("x").code(), "AuthenticationError");
        assert_eq!(ParleyError::logout("x").code(), "LogoutError");
        assert_eq!(ParleyError::presentation("x").code(), "PresentationError");
        assert_eq!(ParleyError::validation("token", "x").code(), "ValidationError");
        assert_eq!(
            ParleyError::Busy { state: LifecycleState::Initializing }.code(),
            "BusyError"
        );
        assert_eq!(ParleyError::unreachable("login_user").code(), "UnreachableError");
        assert_eq!(ParleyError::unexpected("x").code(), "UnexpectedError");
    }

    #[test]
    fn messages_keep_the_cause() {
        let err = ParleyError::initialization("channel key rejected");
        assert_eq!(err.to_string(), "initialization failed: channel key rejected");

        let err = ParleyError::Busy { state: LifecycleState::Ready };
        assert_eq!(err.to_string(), "lifecycle busy: session is ready");
    }

    #[test]
    fn whitespace_counts_as_empty() {
        assert!(require_non_empty("token", "  \t").unwrap_err().is_validation());
        assert!(require_non_empty("token", "jwt").is_ok());
    }
}
