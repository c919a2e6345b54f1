//! Order fulfillment: the checkout coordinator and cart service.
//!
//! [`FulfillmentCoordinator`] converts a mutable cart into an immutable,
//! financially consistent order. The whole write-set — order header, line
//! items, cart clear, stock decrements — commits atomically or not at
//! all; a failure at any step leaves no partial state.

mod cart_service;
mod coordinator;
mod error;

pub use cart_service::CartService;
pub use coordinator::{CheckoutRequest, FulfillmentCoordinator, PlacedOrder};
pub use error::{AddressKind, FulfillmentError, Result};
