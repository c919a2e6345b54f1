//! Record types crossing the storage boundary.

use chrono::{DateTime, Utc};
use common::{AddressId, Money, OrderId, ProductId, UserId};
use domain::{OrderStatus, Quote};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The inventory view of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    /// Current unit price.
    pub price: Money,
    /// Current stock on hand. Never negative.
    pub stock_quantity: u32,
    /// Inactive products are excluded from cart and checkout operations.
    pub is_active: bool,
}

/// Everything needed to persist one order atomically.
///
/// Amounts and line items come from the [`Quote`] computed against the
/// cart snapshot; the storage layer never re-reads product prices.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub shipping_address_id: Option<AddressId>,
    pub billing_address_id: Option<AddressId>,
    pub notes: Option<String>,
    pub quote: Quote,
}

/// The order header as stored. Immutable after creation except for
/// `status` and `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub user_id: UserId,
    pub shipping_address_id: Option<AddressId>,
    pub billing_address_id: Option<AddressId>,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping_cost: Money,
    pub total: Money,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One immutable line item of an order.
///
/// The unit price and product name are purchase-time snapshots and are
/// never re-derived from the products table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub id: Uuid,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
}
