//! # connect-payments
//!
//! Payment orchestration for a marketplace that splits proceeds with a
//! connected seller account via Stripe Connect.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ Storefront  │────▶│  Stripe Hosted  │────▶│ Webhook delivery │
//! │   (cart)    │     │  Checkout Page  │     │  (this crate)    │
//! └─────────────┘     └─────────────────┘     └──────────────────┘
//! ```
//!
//! Two independent components share nothing but configuration:
//!
//! - the **session builder** ([`PaymentGateway`]) turns a cart into a hosted
//!   checkout session, taking the tiered platform fee as an application fee
//!   and routing the remainder to the seller account;
//! - the **webhook processor** ([`WebhookProcessor`]) verifies, classifies,
//!   and dispatches inbound event deliveries to an [`OrderRecorder`]
//!   persistence collaborator.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use connect_payments::{
//!     CheckoutRequest, FeeSchedule, MemoryOrderRecorder, PaymentConfig,
//!     PaymentGateway, WebhookProcessor,
//! };
//!
//! let config = Arc::new(PaymentConfig::from_env()?);
//! let gateway = PaymentGateway::new(config.clone(), FeeSchedule::default());
//!
//! let session = gateway.create_checkout_session(CheckoutRequest {
//!     items: cart,
//!     customer_id: None,
//! }).await?;
//! // Redirect shopper to: session.url
//!
//! let recorder = Arc::new(MemoryOrderRecorder::new());
//! let webhooks = WebhookProcessor::new(config.webhook_secret.clone(), recorder);
//! ```

mod checkout;
mod config;
mod error;
mod fees;
mod store;
mod webhook;

pub use checkout::{
    build_session_spec, CartItem, CheckoutRequest, CreatedSession, CustomerMode, LineItemSpec,
    PaymentGateway, SessionSpec,
};
pub use config::{PaymentConfig, SESSION_ID_TOKEN};
pub use error::{PaymentError, Result};
pub use fees::{to_minor_units, FeeSchedule, FeeTier};
pub use store::{MemoryOrderRecorder, OrderRecorder};
pub use webhook::{
    ChargeSucceeded, CheckoutCompleted, EventKind, PaymentSucceeded, TransferCreated,
    TransferPaid, WebhookEvent, WebhookProcessor, PLATFORM_ACCOUNT,
};
