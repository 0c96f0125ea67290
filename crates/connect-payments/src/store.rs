//! Order Persistence Contract
//!
//! The webhook handlers hand their side effects to an [`OrderRecorder`]
//! collaborator. Real storage lives behind this trait; the in-memory
//! implementation covers development and tests.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::webhook::{
    ChargeSucceeded, CheckoutCompleted, PaymentSucceeded, TransferCreated, TransferPaid,
};

/// Persistence collaborator invoked once per classified webhook delivery.
///
/// Implementations own their internal retry and error policy; a returned
/// error is logged by the processor but never blocks acknowledgment.
#[async_trait]
pub trait OrderRecorder: Send + Sync {
    /// Record a completed order from a finished checkout session
    async fn record_completed_order(&self, order: &CheckoutCompleted) -> Result<()>;

    /// Record or update payment status for a succeeded intent
    async fn record_payment(&self, payment: &PaymentSucceeded) -> Result<()>;

    /// Record a captured charge and its associated transfer
    async fn record_charge(&self, charge: &ChargeSucceeded) -> Result<()>;

    /// Record a transfer created towards the seller account
    async fn record_transfer(&self, transfer: &TransferCreated) -> Result<()>;

    /// Mark a transfer as paid out
    async fn confirm_transfer(&self, transfer: &TransferPaid) -> Result<()>;
}

/// In-memory recorder (for development)
#[derive(Default)]
pub struct MemoryOrderRecorder {
    orders: RwLock<Vec<CheckoutCompleted>>,
    payments: RwLock<Vec<PaymentSucceeded>>,
    charges: RwLock<Vec<ChargeSucceeded>>,
    transfers: RwLock<Vec<TransferCreated>>,
    paid_transfers: RwLock<Vec<TransferPaid>>,
}

impl MemoryOrderRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn orders(&self) -> Vec<CheckoutCompleted> {
        self.orders.read().await.clone()
    }

    pub async fn payments(&self) -> Vec<PaymentSucceeded> {
        self.payments.read().await.clone()
    }

    pub async fn charges(&self) -> Vec<ChargeSucceeded> {
        self.charges.read().await.clone()
    }

    pub async fn transfers(&self) -> Vec<TransferCreated> {
        self.transfers.read().await.clone()
    }

    pub async fn paid_transfers(&self) -> Vec<TransferPaid> {
        self.paid_transfers.read().await.clone()
    }

    /// Total side effects recorded across all event types
    pub async fn side_effect_count(&self) -> usize {
        self.orders.read().await.len()
            + self.payments.read().await.len()
            + self.charges.read().await.len()
            + self.transfers.read().await.len()
            + self.paid_transfers.read().await.len()
    }
}

#[async_trait]
impl OrderRecorder for MemoryOrderRecorder {
    async fn record_completed_order(&self, order: &CheckoutCompleted) -> Result<()> {
        self.orders.write().await.push(order.clone());
        Ok(())
    }

    async fn record_payment(&self, payment: &PaymentSucceeded) -> Result<()> {
        self.payments.write().await.push(payment.clone());
        Ok(())
    }

    async fn record_charge(&self, charge: &ChargeSucceeded) -> Result<()> {
        self.charges.write().await.push(charge.clone());
        Ok(())
    }

    async fn record_transfer(&self, transfer: &TransferCreated) -> Result<()> {
        self.transfers.write().await.push(transfer.clone());
        Ok(())
    }

    async fn confirm_transfer(&self, transfer: &TransferPaid) -> Result<()> {
        self.paid_transfers.write().await.push(transfer.clone());
        Ok(())
    }
}
