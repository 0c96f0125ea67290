//! Application State

use std::sync::Arc;

use connect_payments::{PaymentConfig, PaymentGateway, WebhookProcessor};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Immutable process configuration, read once at startup
    pub config: Arc<PaymentConfig>,

    /// Stripe gateway for the session and portal endpoints
    pub gateway: Arc<PaymentGateway>,

    /// Webhook verification and dispatch pipeline
    pub webhooks: Arc<WebhookProcessor>,
}
