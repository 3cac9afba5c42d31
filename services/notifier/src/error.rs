//! Custom error types for the notifier service

use thiserror::Error;

/// Failures talking to the push delivery gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The request never produced a response (DNS, connect, TLS, ...)
    #[error("Push gateway request failed: {0}")]
    Request(String),

    /// The gateway answered with a non-2xx status
    #[error("HTTP error! status: {status}")]
    Status {
        /// HTTP status code returned by the gateway
        status: u16,
        /// Response body, kept for logs
        body: String,
    },

    /// The response body was not a ticket or list of tickets
    #[error("Invalid push gateway response: {0}")]
    InvalidResponse(String),
}

/// Errors surfaced by the token and dispatch manager
#[derive(Error, Debug)]
pub enum NotifierError {
    /// Notification permission was refused on a physical device
    #[error("Failed to get push token for push notification!")]
    PermissionDenied,

    /// No signed-in identity for an operation that needs one
    #[error("User must be logged in to {0}")]
    NotSignedIn(&'static str),

    /// A per-user or broadcast send found nothing to deliver to
    #[error("{0}")]
    NoActiveTokens(&'static str),

    /// A bulk send was called without any target token
    #[error("No target tokens supplied")]
    EmptyTargets,

    /// Push gateway failure
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Device notification service failure
    #[error("Device notification error: {0}")]
    Device(String),

    /// The device-local key-value store rejected a write
    #[error("Local storage error: {0}")]
    LocalStorage(String),
}

impl NotifierError {
    pub fn device(err: impl std::fmt::Display) -> Self {
        NotifierError::Device(err.to_string())
    }
}

/// Type alias for notifier results
pub type NotifierResult<T> = Result<T, NotifierError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_status_message_names_the_status() {
        let err: NotifierError = GatewayError::Status {
            status: 503,
            body: "unavailable".to_string(),
        }
        .into();

        assert_eq!(err.to_string(), "HTTP error! status: 503");
    }

    #[test]
    fn not_signed_in_names_the_operation() {
        let err = NotifierError::NotSignedIn("send broadcast notifications");
        assert_eq!(
            err.to_string(),
            "User must be logged in to send broadcast notifications"
        );
    }
}
