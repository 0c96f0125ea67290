//! HTTP surface for the marketplace split-payments backend.
//!
//! Routes mirror the storefront contract: session creation and lookup,
//! billing portal, and the Stripe webhook endpoint.

pub mod handlers;
pub mod state;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::handlers::{
    checkout_session, create_checkout_session, create_portal_session, home, stripe_webhook,
};
use crate::state::AppState;

/// Assemble the application router. Middleware (CORS, request tracing) is
/// layered on by the binary so tests can drive the bare routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/checkout-session", get(checkout_session))
        .route("/create-portal-session", post(create_portal_session))
        .route("/webhook", post(stripe_webhook))
        .with_state(state)
}

/// CORS layer restricted to the configured storefront origins. The browser
/// sends checkout requests with credentials, and credentialed CORS forbids
/// wildcards, so methods and headers are explicit lists.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .allow_credentials(true)
}
