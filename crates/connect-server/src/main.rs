//! Marketplace split-payments HTTP server
//!
//! Axum-based server wiring the checkout session builder and the webhook
//! processor to their routes, with CORS restricted to the configured
//! storefront origins.

use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use connect_payments::{
    FeeSchedule, MemoryOrderRecorder, PaymentConfig, PaymentGateway, WebhookProcessor,
};
use connect_server::{cors_layer, router, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = Arc::new(PaymentConfig::from_env()?);
    tracing::info!(
        destination = %config.destination_account,
        frontend = %config.frontend_url,
        "✓ Stripe configured"
    );

    // The in-memory recorder stands in until real order persistence lands.
    let recorder = Arc::new(MemoryOrderRecorder::new());
    let gateway = Arc::new(PaymentGateway::new(config.clone(), FeeSchedule::default()));
    let webhooks = Arc::new(WebhookProcessor::new(
        config.webhook_secret.clone(),
        recorder,
    ));

    let state = AppState {
        config: config.clone(),
        gateway,
        webhooks,
    };

    // CORS configuration: storefront plus local dev origins only
    tracing::info!(origins = ?config.allowed_origins, "CORS allow-list");
    let app = router(state)
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 connect-market server running on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /                        - Liveness");
    tracing::info!("  POST /create-checkout-session - Create split-payment checkout");
    tracing::info!("  GET  /checkout-session        - Look up session customer");
    tracing::info!("  POST /create-portal-session   - Open billing portal");
    tracing::info!("  POST /webhook                 - Stripe webhook delivery");

    axum::serve(listener, app).await?;

    Ok(())
}
