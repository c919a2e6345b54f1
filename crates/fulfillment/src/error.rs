//! Fulfillment error taxonomy.
//!
//! The HTTP status noted on each variant is the mapping the transport
//! layer (an external collaborator) is expected to apply.

use common::{CartLineId, OrderId, ProductId};
use domain::{InvalidStatus, OrderStatus};
use storage::StorageError;
use thiserror::Error;

/// Which of the two optional address references failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Shipping,
    Billing,
}

impl std::fmt::Display for AddressKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressKind::Shipping => write!(f, "shipping"),
            AddressKind::Billing => write!(f, "billing"),
        }
    }
}

/// Errors surfaced by checkout, status updates, and cart operations.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Checkout was requested against an empty cart. (400)
    #[error("cart is empty")]
    EmptyCart,

    /// A cart line asked for more units than are available. Carries the
    /// offending product and the quantity available when the check ran.
    /// (400)
    #[error("insufficient stock for product {product_id}: {available} available")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
    },

    /// A referenced address does not exist or belongs to another user.
    /// (400)
    #[error("invalid {0} address")]
    InvalidAddress(AddressKind),

    /// A status update named a value outside the enumerated set. (400)
    #[error("invalid order status: {0}")]
    InvalidStatus(String),

    /// The requested status is not an allowed successor of the order's
    /// current status. (409)
    #[error("order cannot move from {from} to {to}")]
    ForbiddenTransition { from: OrderStatus, to: OrderStatus },

    /// The referenced order does not exist. (404)
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// The referenced product does not exist or is inactive. (404)
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// The referenced cart line does not exist or belongs to another
    /// user. (404)
    #[error("cart line not found: {0}")]
    CartLineNotFound(CartLineId),

    /// A cart quantity was zero, negative, or out of range. (400)
    #[error("quantity must be a positive integer, got {0}")]
    InvalidQuantity(i64),

    /// Transient storage fault. Any open transaction was rolled back in
    /// full; the caller may retry the whole operation from scratch. (500)
    #[error("fulfillment unavailable: {0}")]
    Unavailable(StorageError),
}

impl FulfillmentError {
    /// True for faults worth retrying (always from a fresh cart read).
    pub fn is_retryable(&self) -> bool {
        matches!(self, FulfillmentError::Unavailable(_))
    }
}

impl From<StorageError> for FulfillmentError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InsufficientStock {
                product_id,
                available,
            } => FulfillmentError::InsufficientStock {
                product_id,
                available,
            },
            StorageError::ProductNotFound(id) => FulfillmentError::ProductNotFound(id),
            other => FulfillmentError::Unavailable(other),
        }
    }
}

impl From<InvalidStatus> for FulfillmentError {
    fn from(err: InvalidStatus) -> Self {
        FulfillmentError::InvalidStatus(err.0)
    }
}

/// Convenience alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
