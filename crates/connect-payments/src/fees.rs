//! Platform Fee Schedule
//!
//! The platform takes a tiered flat fee selected by total order value, not a
//! percentage cut. Flat fees keep the platform margin predictable and simple
//! to reconcile; three tiers approximate a progressive schedule without
//! per-item proration.

use crate::error::{PaymentError, Result};

/// One fee tier: applies to totals up to and including `upper_bound`
/// (minor units). `None` means unbounded and must be the final tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeeTier {
    pub upper_bound: Option<i64>,
    pub fee: i64,
}

/// Ordered fee tiers, evaluated ascending, first match wins.
#[derive(Clone, Debug)]
pub struct FeeSchedule {
    tiers: Vec<FeeTier>,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            tiers: vec![
                FeeTier { upper_bound: Some(10_000), fee: 1_000 },
                FeeTier { upper_bound: Some(20_000), fee: 1_500 },
                FeeTier { upper_bound: None, fee: 2_000 },
            ],
        }
    }
}

impl FeeSchedule {
    /// Build a custom schedule. Tiers must be non-empty, strictly ascending
    /// by bound, and end with an unbounded tier.
    pub fn new(tiers: Vec<FeeTier>) -> Result<Self> {
        let Some((last, bounded)) = tiers.split_last() else {
            return Err(PaymentError::Config("fee schedule has no tiers".into()));
        };
        if last.upper_bound.is_some() {
            return Err(PaymentError::Config(
                "final fee tier must be unbounded".into(),
            ));
        }
        let mut previous = None;
        for tier in bounded {
            let Some(bound) = tier.upper_bound else {
                return Err(PaymentError::Config(
                    "only the final fee tier may be unbounded".into(),
                ));
            };
            if previous.is_some_and(|p| bound <= p) {
                return Err(PaymentError::Config(
                    "fee tiers must be strictly ascending".into(),
                ));
            }
            previous = Some(bound);
        }
        Ok(Self { tiers })
    }

    /// Select the flat fee for an order total in minor units.
    pub fn fee_for(&self, total_minor: i64) -> i64 {
        self.tiers
            .iter()
            .find(|tier| tier.upper_bound.is_none_or(|bound| total_minor <= bound))
            .map(|tier| tier.fee)
            .unwrap_or(0)
    }
}

/// Convert a major-unit price to integer minor units (cents).
///
/// Conversion happens per unit, not on the aggregate, so rounding cannot
/// drift across items with differing prices. Returns `None` when the price
/// does not fit the minor-unit range.
pub fn to_minor_units(price: f64) -> Option<i64> {
    let minor = (price * 100.0).round();
    if minor.is_finite() && minor.abs() < i64::MAX as f64 {
        Some(minor as i64)
    } else {
        None
    }
}
