//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Stripe API error (message passed through verbatim)
    #[error("{0}")]
    Stripe(String),

    /// Cart failed validation before any processor call
    #[error("invalid cart: {0}")]
    InvalidCart(String),

    /// Webhook payload was empty or did not parse as an event envelope
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),

    /// Webhook signature header missing, stale, or mismatched
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage error from the persistence collaborator
    #[error("storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Whether the error is the caller's fault (4xx at the HTTP boundary).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, PaymentError::Config(_) | PaymentError::Storage(_))
    }
}
