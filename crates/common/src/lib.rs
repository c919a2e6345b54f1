//! Shared types for the order fulfillment core.
//!
//! Identifier newtypes keep the many UUID-keyed entities (users, products,
//! orders, addresses, cart lines) from being mixed up at compile time.
//! All monetary amounts are carried as [`Money`], an exact fixed-point
//! value in integer cents.

mod ids;
mod money;

pub use ids::{AddressId, CartLineId, OrderId, ProductId, UserId};
pub use money::Money;
