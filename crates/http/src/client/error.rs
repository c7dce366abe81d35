//! Client error types

use rotary_gate_core::StoreError;
use std::fmt;
use thiserror::Error;

/// Why a session could not be renewed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionExpiredReason {
    /// No refresh token was stored; the auth server was not contacted
    NoRefreshToken,
    /// The refresh call itself failed
    Transport(String),
    /// The auth server answered with a non-2xx status
    Rejected(u16),
    /// The refresh response did not carry a new access token
    MalformedResponse(String),
    /// The renewed tokens could not be read or written
    Store(String),
}

impl fmt::Display for SessionExpiredReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRefreshToken => write!(f, "no refresh token available"),
            Self::Transport(e) => write!(f, "refresh request failed: {e}"),
            Self::Rejected(status) => write!(f, "refresh rejected with status {status}"),
            Self::MalformedResponse(e) => write!(f, "malformed refresh response: {e}"),
            Self::Store(e) => write!(f, "token store unavailable: {e}"),
        }
    }
}

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error, passed through untouched
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The session could not be renewed; the user must sign in again
    #[error("Session expired: {0}")]
    SessionExpired(SessionExpiredReason),

    /// The caller cancelled the request before a response arrived
    #[error("Request cancelled")]
    Cancelled,

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A header name or value could not be encoded
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Token store error
    #[error("Token store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Whether the user has to authenticate again to continue
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired(_) | Self::AuthenticationFailed(_))
    }

    /// The teardown reason, when this error ended the session
    pub const fn session_expired_reason(&self) -> Option<&SessionExpiredReason> {
        match self {
            Self::SessionExpired(reason) => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status() {
        assert!(matches!(
            ClientError::from_status(StatusCode::BAD_REQUEST, "x".into()),
            ClientError::BadRequest(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::UNAUTHORIZED, "x".into()),
            ClientError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::FORBIDDEN, "x".into()),
            ClientError::Forbidden(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::NOT_FOUND, "x".into()),
            ClientError::NotFound(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::BAD_GATEWAY, "x".into()),
            ClientError::ServerError { status: 502, .. }
        ));
    }

    #[test]
    fn test_is_auth_expired() {
        assert!(ClientError::SessionExpired(SessionExpiredReason::NoRefreshToken).is_auth_expired());
        assert!(ClientError::AuthenticationFailed("nope".into()).is_auth_expired());
        assert!(!ClientError::Forbidden("nope".into()).is_auth_expired());
        assert!(!ClientError::Cancelled.is_auth_expired());
    }

    #[test]
    fn test_reason_display() {
        let err = ClientError::SessionExpired(SessionExpiredReason::Rejected(400));
        assert_eq!(
            err.to_string(),
            "Session expired: refresh rejected with status 400"
        );
        assert_eq!(
            err.session_expired_reason(),
            Some(&SessionExpiredReason::Rejected(400))
        );
    }
}
