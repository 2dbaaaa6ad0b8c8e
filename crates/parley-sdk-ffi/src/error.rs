//! Error types for FFI layer
//!
//! One variant per stable error code so Kotlin and Swift callers can branch on
//! the category and still show the underlying cause.

use std::fmt;

use crate::events::LifecycleState;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, uniffi::Error)]
pub enum ParleyFfiError {
    #[error("Initialization error: {msg}")]
    Initialization { msg: String },

    #[error("Authentication error: {reason}")]
    Authentication { reason: String },

    #[error("Logout error: {msg}")]
    Logout { msg: String },

    #[error("Presentation error: {reason}")]
    Presentation { reason: String },

    #[error("Invalid parameter: {field} - {msg}")]
    Validation { field: String, msg: String },

    #[error("Busy: session is {state:?}")]
    Busy { state: LifecycleState },

    #[error("Unreachable: {operation} requires a ready session")]
    Unreachable { operation: String },

    #[error("Unexpected error: {msg}")]
    Unexpected { msg: String },
}

impl ParleyFfiError {
    pub fn invalid_parameter(field: &str, msg: &str) -> Self {
        tracing::error!("Invalid parameter {}: {}", field, msg);
        Self::Validation {
            field: field.to_string(),
            msg: msg.to_string(),
        }
    }

    pub fn unexpected<T: fmt::Display>(msg: T) -> Self {
        let msg_str = msg.to_string();
        tracing::error!("Unexpected error: {}", msg_str);
        Self::Unexpected { msg: msg_str }
    }

    /// Same codes the core crate reports
    pub fn code(&self) -> &'static str {
        match self {
            Self::Initialization { .. } => "InitializationError",
            Self::Authentication { .. } => "AuthenticationError",
            Self::Logout { .. } => "LogoutError",
            Self::Presentation { .. } => "PresentationError",
            Self::Validation { .. } => "ValidationError",
            Self::Busy { .. } => "BusyError",
            Self::Unreachable { .. } => "UnreachableError",
            Self::Unexpected { .. } => "UnexpectedError",
        }
    }

    /// Human-readable message, never empty
    pub fn message(&self) -> String {
        let s = match self {
            Self::Initialization { msg } => msg.clone(),
            Self::Authentication { reason } => reason.clone(),
            Self::Logout { msg } => msg.clone(),
            Self::Presentation { reason } => reason.clone(),
            Self::Validation { field, msg } => format!("{}: {}", field, msg),
            Self::Busy { state } => format!("session is {:?}", state),
            Self::Unreachable { operation } => format!("{} requires a ready session", operation),
            Self::Unexpected { msg } => msg.clone(),
        };
        ensure_non_empty(s, "Unknown error")
    }
}

/// Keep error text non-empty so Kotlin/iOS never show a blank message
fn ensure_non_empty(s: String, fallback: &'static str) -> String {
    let t = s.trim();
    if t.is_empty() {
        fallback.to_string()
    } else {
        s
    }
}

impl From<parley_sdk::ParleyError> for ParleyFfiError {
    fn from(error: parley_sdk::ParleyError) -> Self {
        use parley_sdk::ParleyError;

        tracing::error!("SDK error [{}]: {}", error.code(), error);

        match error {
            ParleyError::Initialization { cause } => Self::Initialization {
                msg: ensure_non_empty(cause, "Initialization failed"),
            },
            ParleyError::Authentication { reason } => Self::Authentication {
                reason: ensure_non_empty(reason, "Authentication failed"),
            },
            ParleyError::Logout { cause } => Self::Logout {
                msg: ensure_non_empty(cause, "Logout failed"),
            },
            ParleyError::Presentation { reason } => Self::Presentation {
                reason: ensure_non_empty(reason, "Presentation failed"),
            },
            ParleyError::Validation { field, message } => Self::Validation {
                field,
                msg: ensure_non_empty(message, "Invalid input"),
            },
            ParleyError::Busy { state } => Self::Busy { state: state.into() },
            ParleyError::Unreachable { operation } => Self::Unreachable { operation },
            ParleyError::Unexpected { message } => Self::Unexpected {
                msg: ensure_non_empty(message, "Unexpected error"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_sdk::ParleyError;

    #[test]
    fn codes_survive_conversion() {
        let cases = [
            ParleyError::initialization("bad key"),
            ParleyError::authentication("expired"),
            ParleyError::logout("no session"),
            ParleyError::presentation("no host"),
            ParleyError::validation("token", "must not be empty"),
            ParleyError::Busy {
                state: parley_sdk::LifecycleState::Initializing,
            },
            ParleyError::unreachable("login_user"),
            ParleyError::unexpected("boom"),
        ];
        for error in cases {
            let code = error.code();
            assert_eq!(ParleyFfiError::from(error).code(), code);
        }
    }

    #[test]
    fn message_is_never_blank() {
        let err = ParleyFfiError::from(ParleyError::Authentication { reason: "  ".into() });
        assert_eq!(err.message(), "Authentication failed");

        let err = ParleyFfiError::from(ParleyError::initialization("channel key rejected"));
        assert_eq!(err.message(), "channel key rejected");

        let err = ParleyFfiError::invalid_parameter("token", "must not be empty");
        assert_eq!(err.message(), "token: must not be empty");
    }
}
