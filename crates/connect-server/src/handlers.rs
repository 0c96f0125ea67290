//! HTTP Handlers

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use connect_payments::{CheckoutRequest, PaymentError};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HomeResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CheckoutSessionResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PortalRequest {
    pub customer_id: String,
}

#[derive(Debug, Serialize)]
pub struct PortalResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

/// Map a payment error to its HTTP response. Webhook authenticity failures
/// keep their two fixed client messages; processor rejections pass the
/// underlying message through verbatim.
fn error_response(e: &PaymentError) -> HandlerError {
    let (status, code, message) = match e {
        PaymentError::InvalidPayload(_) => {
            (StatusCode::BAD_REQUEST, "INVALID_PAYLOAD", "Invalid payload".to_string())
        }
        PaymentError::InvalidSignature(_) => {
            (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE", "Invalid signature".to_string())
        }
        PaymentError::InvalidCart(_) => {
            (StatusCode::BAD_REQUEST, "INVALID_CART", e.to_string())
        }
        PaymentError::Stripe(message) => {
            (StatusCode::BAD_REQUEST, "STRIPE_ERROR", message.clone())
        }
        PaymentError::Config(_) | PaymentError::Storage(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            e.to_string(),
        ),
    };
    (
        status,
        Json(ErrorResponse {
            error: message,
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Liveness probe
pub async fn home() -> Json<HomeResponse> {
    Json(HomeResponse {
        message: "Server is running",
    })
}

/// Create a split-payment checkout session for the posted cart
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<CheckoutSessionResponse>, HandlerError> {
    let session = state
        .gateway
        .create_checkout_session(payload)
        .await
        .map_err(|e| {
            tracing::error!("checkout session error: {e}");
            error_response(&e)
        })?;

    Ok(Json(CheckoutSessionResponse {
        session_id: session.id,
        url: session.url,
    }))
}

/// Look up the customer attached to an existing checkout session
pub async fn checkout_session(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<CustomerResponse>, HandlerError> {
    let customer_id = state
        .gateway
        .session_customer(&query.session_id)
        .await
        .map_err(|e| {
            tracing::error!(session_id = %query.session_id, "session lookup error: {e}");
            error_response(&e)
        })?;

    Ok(Json(CustomerResponse { customer_id }))
}

/// Open a self-service billing portal session
pub async fn create_portal_session(
    State(state): State<AppState>,
    Json(payload): Json<PortalRequest>,
) -> Result<Json<PortalResponse>, HandlerError> {
    let url = state
        .gateway
        .create_portal_session(&payload.customer_id)
        .await
        .map_err(|e| {
            tracing::error!(customer_id = %payload.customer_id, "portal session error: {e}");
            error_response(&e)
        })?;

    Ok(Json(PortalResponse { url }))
}

/// Stripe webhook endpoint. A 200 tells Stripe not to redeliver, so the ack
/// goes out for every delivery that passes verification, handled or not.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, HandlerError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("webhook delivery without stripe-signature header");
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Missing Stripe signature".into(),
                    code: "MISSING_SIGNATURE".into(),
                }),
            )
        })?;

    state.webhooks.process(&body, signature).await.map_err(|e| {
        tracing::warn!("webhook delivery rejected: {e}");
        error_response(&e)
    })?;

    Ok(Json(WebhookAck { status: "success" }))
}
