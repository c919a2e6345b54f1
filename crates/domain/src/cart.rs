//! Point-in-time cart snapshots.

use chrono::{DateTime, Utc};
use common::{CartLineId, Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// One cart line joined with its product's current price and stock.
///
/// Produced by the storage layer as part of a [`CartSnapshot`]; the price
/// and stock fields reflect the product at the instant of the read, not
/// at checkout commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// The cart line identifier.
    pub id: CartLineId,
    /// The product this line refers to.
    pub product_id: ProductId,
    /// Product name, carried for presentation.
    pub product_name: String,
    /// Quantity requested by the user. Always at least 1.
    pub quantity: u32,
    /// Unit price at the instant of the read.
    pub unit_price: Money,
    /// Stock available at the instant of the read.
    pub stock_quantity: u32,
    /// When the line was first added to the cart.
    pub created_at: DateTime<Utc>,
}

impl CartLine {
    /// Returns the line total (unit price × quantity).
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// An immutable snapshot of one user's cart.
///
/// Only lines for active products appear in a snapshot. The snapshot is
/// advisory with respect to stock: the authoritative oversell check is
/// the storage layer's conditional decrement at commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    user_id: UserId,
    lines: Vec<CartLine>,
}

impl CartSnapshot {
    /// Creates a snapshot from the lines read for a user.
    pub fn new(user_id: UserId, lines: Vec<CartLine>) -> Self {
        Self { user_id, lines }
    }

    /// The user the snapshot belongs to.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of lines in the snapshot.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Iterates over the snapshot's lines in read order.
    pub fn lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.iter()
    }

    /// Returns the first line whose quantity exceeds the stock observed
    /// at read time, if any.
    ///
    /// This is the advisory pre-transaction check; a `None` here does not
    /// guarantee the decrement will succeed at commit time.
    pub fn first_shortfall(&self) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.quantity > l.stock_quantity)
    }
}
