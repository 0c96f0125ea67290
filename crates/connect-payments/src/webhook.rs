//! Stripe Webhook Processing
//!
//! Each delivery runs the same pipeline: parse the raw payload, verify the
//! signature against the shared signing secret, classify the event by its
//! type tag, dispatch to the matching handler, acknowledge. Payload and
//! signature failures are reported separately because they point at
//! different operational problems: a payload that will not parse usually
//! means an upstream transport or proxy bug, a signature mismatch means a
//! forged delivery or a misconfigured secret.

use std::sync::Arc;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{PaymentError, Result};
use crate::store::OrderRecorder;

type HmacSha256 = Hmac<Sha256>;

/// Reject deliveries whose signed timestamp is older than this (replay
/// protection, same window Stripe's own libraries use).
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Account context reported for events without a connected-account scope.
pub const PLATFORM_ACCOUNT: &str = "platform";

/// Raw event envelope as delivered by Stripe
#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    account: Option<String>,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

/// A completed checkout session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutCompleted {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

/// A succeeded payment intent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentSucceeded {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub customer: Option<String>,
}

/// A captured charge
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChargeSucceeded {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub transfer: Option<String>,
}

/// A transfer created towards the connected seller account
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferCreated {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub destination: Option<String>,
}

/// A transfer confirmed as paid out
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferPaid {
    pub id: String,
    pub amount: i64,
}

/// Classified event payload
#[derive(Clone, Debug)]
pub enum EventKind {
    CheckoutCompleted(CheckoutCompleted),
    PaymentSucceeded(PaymentSucceeded),
    ChargeSucceeded(ChargeSucceeded),
    TransferCreated(TransferCreated),
    TransferPaid(TransferPaid),

    /// Anything outside the handled set; acknowledged without side effects
    Other { event_type: String },
}

/// A verified, classified delivery
#[derive(Clone, Debug)]
pub struct WebhookEvent {
    /// Processor-assigned event id
    pub id: String,

    /// Originating account, [`PLATFORM_ACCOUNT`] when the event carries no
    /// connected-account scope
    pub account: String,

    pub kind: EventKind,
}

/// Webhook processor: verification, classification, and dispatch
pub struct WebhookProcessor {
    signing_secret: String,
    recorder: Arc<dyn OrderRecorder>,
}

impl WebhookProcessor {
    pub fn new(signing_secret: impl Into<String>, recorder: Arc<dyn OrderRecorder>) -> Self {
        Self {
            signing_secret: signing_secret.into(),
            recorder,
        }
    }

    /// Run one delivery through the pipeline.
    ///
    /// `payload` must be the exact request bytes; any re-serialization
    /// breaks the signature. A returned `Ok` means the delivery may be
    /// acknowledged; recorder failures are logged, not propagated, because
    /// a 200 is the contract that stops redelivery once verification passed.
    pub async fn process(&self, payload: &[u8], signature_header: &str) -> Result<WebhookEvent> {
        let envelope = parse_envelope(payload)?;
        verify_signature(payload, signature_header, &self.signing_secret)?;

        let event = classify(envelope)?;
        tracing::debug!(
            event_id = %event.id,
            account = %event.account,
            "webhook delivery verified"
        );

        self.dispatch(&event).await;
        Ok(event)
    }

    async fn dispatch(&self, event: &WebhookEvent) {
        let result = match &event.kind {
            EventKind::CheckoutCompleted(order) => {
                tracing::info!(
                    event_id = %event.id,
                    session_id = %order.id,
                    customer = ?order.customer,
                    amount_total = ?order.amount_total,
                    "checkout session completed"
                );
                self.recorder.record_completed_order(order).await
            }
            EventKind::PaymentSucceeded(payment) => {
                tracing::info!(
                    event_id = %event.id,
                    intent_id = %payment.id,
                    amount = payment.amount,
                    currency = %payment.currency,
                    "payment intent succeeded"
                );
                self.recorder.record_payment(payment).await
            }
            EventKind::ChargeSucceeded(charge) => {
                tracing::info!(
                    event_id = %event.id,
                    charge_id = %charge.id,
                    amount = charge.amount,
                    transfer = ?charge.transfer,
                    "charge succeeded"
                );
                self.recorder.record_charge(charge).await
            }
            EventKind::TransferCreated(transfer) => {
                tracing::info!(
                    event_id = %event.id,
                    transfer_id = %transfer.id,
                    amount = transfer.amount,
                    destination = ?transfer.destination,
                    "transfer created"
                );
                self.recorder.record_transfer(transfer).await
            }
            EventKind::TransferPaid(transfer) => {
                tracing::info!(
                    event_id = %event.id,
                    transfer_id = %transfer.id,
                    amount = transfer.amount,
                    "transfer paid"
                );
                self.recorder.confirm_transfer(transfer).await
            }
            EventKind::Other { event_type } => {
                tracing::debug!(
                    event_id = %event.id,
                    event_type = %event_type,
                    account = %event.account,
                    "unhandled webhook event"
                );
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::error!(
                event_id = %event.id,
                account = %event.account,
                error = %e,
                "webhook side effect failed; delivery acknowledged anyway"
            );
        }
    }
}

fn parse_envelope(payload: &[u8]) -> Result<EventEnvelope> {
    if payload.is_empty() {
        return Err(PaymentError::InvalidPayload("empty body".into()));
    }
    serde_json::from_slice(payload).map_err(|e| PaymentError::InvalidPayload(e.to_string()))
}

fn classify(envelope: EventEnvelope) -> Result<WebhookEvent> {
    let account = envelope
        .account
        .unwrap_or_else(|| PLATFORM_ACCOUNT.to_string());
    let object = envelope.data.object;

    let kind = match envelope.event_type.as_str() {
        "checkout.session.completed" => EventKind::CheckoutCompleted(parse_object(object)?),
        "payment_intent.succeeded" => EventKind::PaymentSucceeded(parse_object(object)?),
        "charge.succeeded" => EventKind::ChargeSucceeded(parse_object(object)?),
        "transfer.created" => EventKind::TransferCreated(parse_object(object)?),
        "transfer.paid" => EventKind::TransferPaid(parse_object(object)?),
        _ => EventKind::Other {
            event_type: envelope.event_type,
        },
    };

    Ok(WebhookEvent {
        id: envelope.id,
        account,
        kind,
    })
}

fn parse_object<T: serde::de::DeserializeOwned>(object: serde_json::Value) -> Result<T> {
    serde_json::from_value(object).map_err(|e| PaymentError::InvalidPayload(e.to_string()))
}

/// Verify the `t=<ts>,v1=<hex>` signature header: HMAC-SHA256 over
/// `"{t}.{body}"` with the signing secret, constant-time comparison, and a
/// freshness window on the signed timestamp.
fn verify_signature(payload: &[u8], header: &str, secret: &str) -> Result<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(PaymentError::InvalidSignature("missing v1 signature".into()));
    }

    let now = Utc::now().timestamp();
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(PaymentError::InvalidSignature(
            "timestamp outside tolerance".into(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    if signatures.iter().any(|sig| constant_time_eq(sig, &expected)) {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature("no matching v1 signature".into()))
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryOrderRecorder;
    use async_trait::async_trait;
    use serde_json::json;

    const SECRET: &str = "whsec_test123secret456";

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn sign_now(payload: &[u8]) -> String {
        sign(payload, SECRET, Utc::now().timestamp())
    }

    fn processor() -> (WebhookProcessor, Arc<MemoryOrderRecorder>) {
        let recorder = Arc::new(MemoryOrderRecorder::new());
        (WebhookProcessor::new(SECRET, recorder.clone()), recorder)
    }

    fn checkout_completed_payload() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_test_123",
                    "customer": "cus_123",
                    "amount_total": 10_000,
                    "payment_intent": "pi_123"
                }
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_valid_delivery_records_one_order() {
        let (processor, recorder) = processor();
        let payload = checkout_completed_payload();

        let event = processor.process(&payload, &sign_now(&payload)).await.unwrap();

        assert!(matches!(event.kind, EventKind::CheckoutCompleted(_)));
        assert_eq!(event.account, PLATFORM_ACCOUNT);

        let orders = recorder.orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, "cs_test_123");
        assert_eq!(orders[0].customer.as_deref(), Some("cus_123"));
        assert_eq!(orders[0].amount_total, Some(10_000));
        assert_eq!(orders[0].payment_intent.as_deref(), Some("pi_123"));
        assert_eq!(recorder.side_effect_count().await, 1);
    }

    #[tokio::test]
    async fn test_each_handled_type_fires_exactly_one_side_effect() {
        let deliveries = [
            json!({"type": "payment_intent.succeeded", "data": {"object": {
                "id": "pi_1", "amount": 15_000, "currency": "usd", "customer": "cus_9"}}}),
            json!({"type": "charge.succeeded", "data": {"object": {
                "id": "ch_1", "amount": 15_000, "transfer": "tr_1"}}}),
            json!({"type": "transfer.created", "data": {"object": {
                "id": "tr_1", "amount": 13_500, "destination": "acct_seller"}}}),
            json!({"type": "transfer.paid", "data": {"object": {
                "id": "tr_1", "amount": 13_500}}}),
        ];

        for delivery in deliveries {
            let (processor, recorder) = processor();
            let payload = serde_json::to_vec(&delivery).unwrap();
            processor.process(&payload, &sign_now(&payload)).await.unwrap();
            assert_eq!(recorder.side_effect_count().await, 1);
        }
    }

    #[tokio::test]
    async fn test_transfer_fields_reach_recorder() {
        let (processor, recorder) = processor();
        let payload = serde_json::to_vec(&json!({
            "id": "evt_tr",
            "type": "transfer.created",
            "data": {"object": {"id": "tr_42", "amount": 9_000, "destination": "acct_seller"}}
        }))
        .unwrap();

        processor.process(&payload, &sign_now(&payload)).await.unwrap();

        let transfers = recorder.transfers().await;
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].id, "tr_42");
        assert_eq!(transfers[0].amount, 9_000);
        assert_eq!(transfers[0].destination.as_deref(), Some("acct_seller"));
    }

    #[tokio::test]
    async fn test_unknown_type_acknowledged_without_side_effects() {
        let (processor, recorder) = processor();
        let payload = serde_json::to_vec(&json!({
            "id": "evt_2",
            "type": "invoice.finalized",
            "data": {"object": {"id": "in_1"}}
        }))
        .unwrap();

        let event = processor.process(&payload, &sign_now(&payload)).await.unwrap();

        assert!(matches!(event.kind, EventKind::Other { ref event_type } if event_type == "invoice.finalized"));
        assert_eq!(recorder.side_effect_count().await, 0);
    }

    #[tokio::test]
    async fn test_connected_account_context_is_carried() {
        let (processor, _) = processor();
        let payload = serde_json::to_vec(&json!({
            "id": "evt_3",
            "type": "transfer.paid",
            "account": "acct_seller",
            "data": {"object": {"id": "tr_2", "amount": 500}}
        }))
        .unwrap();

        let event = processor.process(&payload, &sign_now(&payload)).await.unwrap();
        assert_eq!(event.account, "acct_seller");
    }

    #[tokio::test]
    async fn test_unparseable_body_is_invalid_payload() {
        let (processor, _) = processor();
        let payload = b"not json at all";

        // Even a correctly signed body is rejected if it cannot parse.
        let result = processor.process(payload, &sign_now(payload)).await;
        assert!(matches!(result, Err(PaymentError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn test_empty_body_is_invalid_payload() {
        let (processor, _) = processor();
        let result = processor.process(b"", &sign_now(b"")).await;
        assert!(matches!(result, Err(PaymentError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn test_wrong_object_shape_is_invalid_payload_not_signature() {
        let (processor, recorder) = processor();
        // Known type tag, but the object is missing required fields.
        let payload = serde_json::to_vec(&json!({
            "id": "evt_4",
            "type": "payment_intent.succeeded",
            "data": {"object": {"customer": "cus_1"}}
        }))
        .unwrap();

        let result = processor.process(&payload, &sign_now(&payload)).await;
        assert!(matches!(result, Err(PaymentError::InvalidPayload(_))));
        assert_eq!(recorder.side_effect_count().await, 0);
    }

    #[tokio::test]
    async fn test_tampered_payload_is_invalid_signature() {
        let (processor, recorder) = processor();
        let payload = checkout_completed_payload();
        let header = sign_now(&payload);

        // Still valid JSON, so the rejection is attributable to the signature.
        let tampered = String::from_utf8(payload)
            .unwrap()
            .replace("\"amount_total\":10000", "\"amount_total\":99999")
            .into_bytes();

        let result = processor.process(&tampered, &header).await;
        assert!(matches!(result, Err(PaymentError::InvalidSignature(_))));
        assert_eq!(recorder.side_effect_count().await, 0);
    }

    #[tokio::test]
    async fn test_wrong_secret_is_invalid_signature() {
        let (processor, _) = processor();
        let payload = checkout_completed_payload();
        let header = sign(&payload, "whsec_other", Utc::now().timestamp());

        let result = processor.process(&payload, &header).await;
        assert!(matches!(result, Err(PaymentError::InvalidSignature(_))));
    }

    #[tokio::test]
    async fn test_stale_timestamp_is_invalid_signature() {
        let (processor, _) = processor();
        let payload = checkout_completed_payload();
        let header = sign(&payload, SECRET, Utc::now().timestamp() - 600);

        let result = processor.process(&payload, &header).await;
        assert!(matches!(result, Err(PaymentError::InvalidSignature(_))));
    }

    #[tokio::test]
    async fn test_malformed_header_is_invalid_signature() {
        let (processor, _) = processor();
        let payload = checkout_completed_payload();

        for header in ["", "garbage", "t=notanumber,v1=abc", "v1=abc", "t=12345"] {
            let result = processor.process(&payload, header).await;
            assert!(
                matches!(result, Err(PaymentError::InvalidSignature(_))),
                "header {header:?} should fail signature verification"
            );
        }
    }

    struct FailingRecorder;

    #[async_trait]
    impl OrderRecorder for FailingRecorder {
        async fn record_completed_order(&self, _: &CheckoutCompleted) -> crate::error::Result<()> {
            Err(PaymentError::Storage("db unavailable".into()))
        }
        async fn record_payment(&self, _: &PaymentSucceeded) -> crate::error::Result<()> {
            Err(PaymentError::Storage("db unavailable".into()))
        }
        async fn record_charge(&self, _: &ChargeSucceeded) -> crate::error::Result<()> {
            Err(PaymentError::Storage("db unavailable".into()))
        }
        async fn record_transfer(&self, _: &TransferCreated) -> crate::error::Result<()> {
            Err(PaymentError::Storage("db unavailable".into()))
        }
        async fn confirm_transfer(&self, _: &TransferPaid) -> crate::error::Result<()> {
            Err(PaymentError::Storage("db unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_recorder_failure_still_acknowledges() {
        let processor = WebhookProcessor::new(SECRET, Arc::new(FailingRecorder));
        let payload = checkout_completed_payload();

        let result = processor.process(&payload, &sign_now(&payload)).await;
        assert!(result.is_ok(), "side-effect failure must not block the ack");
    }
}
