//! Storage error types.

use common::ProductId;
use thiserror::Error;

/// Errors surfaced by the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A conditional stock decrement (or adjustment) would have driven a
    /// product's stock below zero. Carries the quantity that was actually
    /// available when the write was attempted.
    #[error("insufficient stock for product {product_id}: {available} available")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
    },

    /// The referenced product does not exist.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// A stored order status did not parse; indicates external tampering
    /// with the orders table.
    #[error("corrupt status in storage: {0}")]
    CorruptStatus(#[from] domain::InvalidStatus),

    /// Underlying database fault. Retryable by replaying the whole
    /// operation; the failed transaction was rolled back in full.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Convenience alias for storage results.
pub type Result<T> = std::result::Result<T, StorageError>;
