//! Storage boundary for the order fulfillment core.
//!
//! The [`FulfillmentStore`] trait is the only seam through which the rest
//! of the system touches persistent state. The atomic checkout write-set
//! (order header, line items, cart clear, conditional stock decrements)
//! is a single trait operation, [`FulfillmentStore::persist_order`], so
//! that its all-or-nothing guarantee lives at the storage layer where the
//! transaction does.
//!
//! Two implementations are provided: [`PostgresStore`] for production and
//! [`InMemoryStore`] for tests.

pub mod config;
mod error;
mod memory;
mod postgres;
mod records;
mod store;

pub use config::StorageConfig;
pub use error::{Result, StorageError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use records::{NewOrder, OrderItemRecord, OrderRecord, ProductRecord};
pub use store::FulfillmentStore;
