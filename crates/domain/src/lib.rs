//! Domain layer for the order fulfillment core.
//!
//! Pure types and logic with no storage dependency: the point-in-time
//! [`CartSnapshot`], the [`price`] function with its pluggable
//! [`PricingPolicy`], and the [`OrderStatus`] lifecycle.

pub mod cart;
pub mod pricing;
pub mod status;

pub use cart::{CartLine, CartSnapshot};
pub use pricing::{price, PricedLine, PricingPolicy, Quote, ZeroRates};
pub use status::{InvalidStatus, OrderStatus};
