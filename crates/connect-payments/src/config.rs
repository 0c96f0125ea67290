//! Process Configuration
//!
//! Everything the two components need is read from the environment exactly
//! once at startup and carried as an immutable value. Request-handling code
//! never reaches into the environment itself, which keeps both components
//! testable with fabricated configuration.

use crate::error::{PaymentError, Result};

/// Default frontend origin during local development.
const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";

/// Literal token the processor substitutes with the created session's id at
/// redirect time. The session id does not exist until creation completes, so
/// this must reach Stripe verbatim, never pre-resolved.
pub const SESSION_ID_TOKEN: &str = "{CHECKOUT_SESSION_ID}";

/// Immutable process-wide configuration
#[derive(Clone, Debug)]
pub struct PaymentConfig {
    /// Stripe secret API key
    pub secret_key: String,

    /// Connected seller account receiving the non-fee remainder
    pub destination_account: String,

    /// Webhook signing secret shared with Stripe
    pub webhook_secret: String,

    /// Base URL of the storefront, used for redirects
    pub frontend_url: String,

    /// Origins allowed to call this backend cross-origin
    pub allowed_origins: Vec<String>,
}

impl PaymentConfig {
    /// Read configuration from environment variables.
    ///
    /// Required: `STRIPE_SECRET_KEY`, `CONNECTED_ACCOUNT_ID`,
    /// `STRIPE_WEBHOOK_SECRET`. Optional: `FRONTEND_URL` (defaults to the
    /// local dev origin) and `ALLOWED_ORIGINS` (comma-separated extras).
    pub fn from_env() -> Result<Self> {
        let secret_key = require_var("STRIPE_SECRET_KEY")?;
        let destination_account = require_var("CONNECTED_ACCOUNT_ID")?;
        let webhook_secret = require_var("STRIPE_WEBHOOK_SECRET")?;
        let frontend_url = std::env::var("FRONTEND_URL")
            .unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string());

        let allowed_origins =
            collect_origins(&frontend_url, std::env::var("ALLOWED_ORIGINS").ok().as_deref());

        Ok(Self {
            secret_key,
            destination_account,
            webhook_secret,
            frontend_url,
            allowed_origins,
        })
    }

    /// Redirect target after a completed checkout, carrying the session-id
    /// substitution token.
    pub fn success_url(&self) -> String {
        format!(
            "{}/success?session_id={}",
            self.frontend_url, SESSION_ID_TOKEN
        )
    }

    /// Redirect target after an abandoned checkout.
    pub fn cancel_url(&self) -> String {
        format!("{}/", self.frontend_url)
    }

    /// Return target after a billing-portal visit.
    pub fn portal_return_url(&self) -> String {
        format!("{}/success", self.frontend_url)
    }
}

fn require_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| PaymentError::Config(format!("{name} not set")))
}

/// Assemble the CORS allow-list: the storefront origin, the local dev
/// origins, and any comma-separated extras, each listed once.
fn collect_origins(frontend_url: &str, extra: Option<&str>) -> Vec<String> {
    let mut origins = vec![frontend_url.to_string()];
    let defaults = ["http://localhost:5173", "http://localhost:3000"];
    for origin in defaults.into_iter().chain(extra.unwrap_or_default().split(',')) {
        let origin = origin.trim();
        if !origin.is_empty() && !origins.iter().any(|o| o == origin) {
            origins.push(origin.to_string());
        }
    }
    origins
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> PaymentConfig {
        PaymentConfig {
            secret_key: "sk_test_xxx".into(),
            destination_account: "acct_seller".into(),
            webhook_secret: "whsec_test".into(),
            frontend_url: "https://shop.example.com".into(),
            allowed_origins: vec!["https://shop.example.com".into()],
        }
    }

    #[test]
    fn test_success_url_keeps_token_verbatim() {
        let config = test_config();
        assert_eq!(
            config.success_url(),
            "https://shop.example.com/success?session_id={CHECKOUT_SESSION_ID}"
        );
    }

    #[test]
    fn test_redirect_urls_derive_from_frontend() {
        let config = test_config();
        assert_eq!(config.cancel_url(), "https://shop.example.com/");
        assert_eq!(config.portal_return_url(), "https://shop.example.com/success");
    }

    #[test]
    fn test_origin_list_carries_no_duplicates() {
        let origins = collect_origins(
            "http://localhost:5173",
            Some("https://shop.example.com, http://localhost:5173,http://localhost:3000"),
        );
        assert_eq!(
            origins,
            vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
                "https://shop.example.com".to_string(),
            ]
        );
    }
}
