//! Stripe Checkout Integration
//!
//! Builds hosted checkout sessions that split proceeds between the platform
//! and the connected seller account: the tiered platform fee is taken as an
//! application fee and the remainder transfers to the seller.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stripe::{
    BillingPortalSession, CheckoutSession as StripeCheckoutSession,
    CheckoutSessionCustomerCreation, CheckoutSessionId, CheckoutSessionMode, Client,
    CreateBillingPortalSession, CreateCheckoutSession, CreateCheckoutSessionInvoiceCreation,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, CreateCheckoutSessionPaymentIntentData,
    CreateCheckoutSessionPaymentIntentDataTransferData, CreateCheckoutSessionPaymentMethodTypes,
    Currency, CustomerId,
};

use crate::config::PaymentConfig;
use crate::error::{PaymentError, Result};
use crate::fees::{to_minor_units, FeeSchedule};

/// One cart line as supplied by the storefront, prices in major units.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CartItem {
    pub name: String,
    pub price: f64,
    pub quantity: u32,
    #[serde(default)]
    pub image: Option<String>,
}

/// Request to create a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Ordered cart lines, must be non-empty
    pub items: Vec<CartItem>,

    /// Known Stripe customer to attach; absent means auto-create one
    #[serde(default)]
    pub customer_id: Option<String>,
}

/// How the session associates a customer. The two modes are mutually
/// exclusive in the outbound request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CustomerMode {
    Known(String),
    CreateNew,
}

/// One line of the outbound session, price already in minor units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineItemSpec {
    pub name: String,
    pub unit_amount: i64,
    pub quantity: u32,
    pub image: Option<String>,
}

/// Fully derived session request, ready to hand to the processor.
/// Constructed per request and discarded afterwards, never stored.
#[derive(Clone, Debug)]
pub struct SessionSpec {
    pub line_items: Vec<LineItemSpec>,
    pub total_minor: i64,
    pub platform_fee_minor: i64,
    pub destination_account: String,
    pub success_url: String,
    pub cancel_url: String,
    pub customer: CustomerMode,
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatedSession {
    /// Stripe session ID
    pub id: String,

    /// Hosted checkout URL to redirect the shopper to
    pub url: String,
}

/// Validate a cart and derive the session spec: per-unit minor conversion,
/// total, tiered platform fee, redirect URLs, and the customer mode.
pub fn build_session_spec(
    request: &CheckoutRequest,
    config: &PaymentConfig,
    fees: &FeeSchedule,
) -> Result<SessionSpec> {
    if request.items.is_empty() {
        return Err(PaymentError::InvalidCart("cart is empty".into()));
    }

    let mut line_items = Vec::with_capacity(request.items.len());
    let mut total_minor = 0i64;
    for item in &request.items {
        if item.name.trim().is_empty() {
            return Err(PaymentError::InvalidCart("item name is empty".into()));
        }
        if item.price < 0.0 || !item.price.is_finite() {
            return Err(PaymentError::InvalidCart(format!(
                "negative price for '{}'",
                item.name
            )));
        }
        if item.quantity == 0 {
            return Err(PaymentError::InvalidCart(format!(
                "zero quantity for '{}'",
                item.name
            )));
        }

        let unit_amount = to_minor_units(item.price).ok_or_else(|| {
            PaymentError::InvalidCart(format!("price out of range for '{}'", item.name))
        })?;
        total_minor = unit_amount
            .checked_mul(i64::from(item.quantity))
            .and_then(|line_total| total_minor.checked_add(line_total))
            .ok_or_else(|| {
                PaymentError::InvalidCart(format!("cart total out of range at '{}'", item.name))
            })?;
        line_items.push(LineItemSpec {
            name: item.name.clone(),
            unit_amount,
            quantity: item.quantity,
            image: item.image.clone(),
        });
    }

    let customer = match &request.customer_id {
        Some(id) => CustomerMode::Known(id.clone()),
        None => CustomerMode::CreateNew,
    };

    Ok(SessionSpec {
        line_items,
        total_minor,
        platform_fee_minor: fees.fee_for(total_minor),
        destination_account: config.destination_account.clone(),
        success_url: config.success_url(),
        cancel_url: config.cancel_url(),
        customer,
    })
}

/// Stripe client wrapper for the session endpoints
pub struct PaymentGateway {
    client: Client,
    config: Arc<PaymentConfig>,
    fees: FeeSchedule,
}

impl PaymentGateway {
    pub fn new(config: Arc<PaymentConfig>, fees: FeeSchedule) -> Self {
        Self {
            client: Client::new(config.secret_key.clone()),
            config,
            fees,
        }
    }

    /// Create a hosted checkout session splitting proceeds with the
    /// configured seller account.
    ///
    /// Returns the processor-assigned session id and redirect URL. Any
    /// processor rejection surfaces its message verbatim; no retry, and no
    /// partial session is left usable.
    pub async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CreatedSession> {
        let spec = build_session_spec(&request, &self.config, &self.fees)?;

        let line_items = spec
            .line_items
            .iter()
            .map(|item| CreateCheckoutSessionLineItems {
                quantity: Some(u64::from(item.quantity)),
                price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                    currency: Currency::USD,
                    unit_amount: Some(item.unit_amount),
                    product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                        name: item.name.clone(),
                        images: item.image.clone().map(|url| vec![url]),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .collect();

        let mut params = CreateCheckoutSession::new();
        params.success_url = Some(&spec.success_url);
        params.cancel_url = Some(&spec.cancel_url);
        params.mode = Some(CheckoutSessionMode::Payment);
        params.payment_method_types = Some(vec![CreateCheckoutSessionPaymentMethodTypes::Card]);
        params.line_items = Some(line_items);
        params.invoice_creation = Some(CreateCheckoutSessionInvoiceCreation {
            enabled: true,
            ..Default::default()
        });
        params.payment_intent_data = Some(CreateCheckoutSessionPaymentIntentData {
            application_fee_amount: Some(spec.platform_fee_minor),
            transfer_data: Some(CreateCheckoutSessionPaymentIntentDataTransferData {
                amount: None,
                destination: spec.destination_account.clone(),
            }),
            ..Default::default()
        });

        // Exactly one of the two association modes goes out.
        match &spec.customer {
            CustomerMode::Known(id) => params.customer = Some(parse_customer_id(id)?),
            CustomerMode::CreateNew => {
                params.customer_creation = Some(CheckoutSessionCustomerCreation::Always);
            }
        }

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("no checkout URL returned".into()))?;

        tracing::info!(
            session_id = %session.id,
            total = spec.total_minor,
            platform_fee = spec.platform_fee_minor,
            destination = %spec.destination_account,
            "created checkout session"
        );

        Ok(CreatedSession {
            id: session.id.to_string(),
            url,
        })
    }

    /// Look up the customer attached to an existing session, e.g. to reuse
    /// an auto-created identity after checkout.
    pub async fn session_customer(&self, session_id: &str) -> Result<Option<String>> {
        let id = session_id
            .parse::<CheckoutSessionId>()
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let session = StripeCheckoutSession::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        Ok(session.customer.map(|customer| customer.id().to_string()))
    }

    /// Open a self-service billing portal session for a known customer.
    pub async fn create_portal_session(&self, customer_id: &str) -> Result<String> {
        let customer = parse_customer_id(customer_id)?;
        let return_url = self.config.portal_return_url();

        let mut params = CreateBillingPortalSession::new(customer);
        params.return_url = Some(&return_url);

        let session = BillingPortalSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        Ok(session.url)
    }
}

fn parse_customer_id(id: &str) -> Result<CustomerId> {
    id.parse::<CustomerId>()
        .map_err(|e| PaymentError::Stripe(e.to_string()))
}
