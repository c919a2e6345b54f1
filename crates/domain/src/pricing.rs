//! Pricing of cart snapshots.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::cart::CartSnapshot;

/// Policy hook for tax and shipping.
///
/// The coordinator is written against this trait, so a percentage tax or
/// tiered shipping scheme can be introduced without touching checkout.
pub trait PricingPolicy: Send + Sync {
    /// Tax charged on the given subtotal.
    fn tax(&self, subtotal: Money) -> Money;

    /// Shipping cost for the given cart.
    fn shipping(&self, snapshot: &CartSnapshot) -> Money;
}

/// The current storefront policy: no tax, free shipping.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroRates;

impl PricingPolicy for ZeroRates {
    fn tax(&self, _subtotal: Money) -> Money {
        Money::ZERO
    }

    fn shipping(&self, _snapshot: &CartSnapshot) -> Money {
        Money::ZERO
    }
}

/// One priced line of a quote, with the unit price fixed at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    /// The product being purchased.
    pub product_id: ProductId,
    /// Product name, carried through for presentation.
    pub product_name: String,
    /// Quantity purchased.
    pub quantity: u32,
    /// Unit price captured from the snapshot.
    pub unit_price: Money,
    /// `unit_price × quantity`.
    pub total_price: Money,
}

/// The priced form of a cart snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    /// Per-line totals, in snapshot order.
    pub lines: Vec<PricedLine>,
    /// Sum of all line totals.
    pub subtotal: Money,
    /// Tax from the active policy.
    pub tax: Money,
    /// Shipping cost from the active policy.
    pub shipping: Money,
    /// `subtotal + tax + shipping`, exact.
    pub total: Money,
}

/// Prices a cart snapshot under the given policy.
pub fn price(snapshot: &CartSnapshot, policy: &impl PricingPolicy) -> Quote {
    let lines: Vec<PricedLine> = snapshot
        .lines()
        .map(|line| PricedLine {
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            total_price: line.line_total(),
        })
        .collect();

    let subtotal: Money = lines.iter().map(|l| l.total_price).sum();
    let tax = policy.tax(subtotal);
    let shipping = policy.shipping(snapshot);

    Quote {
        lines,
        subtotal,
        tax,
        shipping,
        total: subtotal + tax + shipping,
    }
}
