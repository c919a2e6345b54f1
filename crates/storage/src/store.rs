//! The storage trait.

use async_trait::async_trait;
use common::{AddressId, CartLineId, OrderId, ProductId, UserId};
use domain::{CartLine, OrderStatus};

use crate::error::Result;
use crate::records::{NewOrder, OrderItemRecord, OrderRecord, ProductRecord};

/// Storage operations backing the order fulfillment core.
///
/// Every mutation to product stock goes through either the conditional
/// decrements inside [`persist_order`](FulfillmentStore::persist_order)
/// or [`adjust_stock`](FulfillmentStore::adjust_stock); both refuse to
/// drive stock below zero atomically at the storage layer.
#[async_trait]
pub trait FulfillmentStore: Send + Sync {
    /// Reads a user's cart lines joined with the current price, stock,
    /// and name of each active product, newest line first.
    ///
    /// An empty vector is the empty-cart signal, not an error.
    async fn load_cart(&self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Fetches a product's inventory view, active or not.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<ProductRecord>>;

    /// Finds the user's cart line for a product, if one exists.
    async fn find_cart_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>>;

    /// Fetches a cart line by id, scoped to its owning user.
    async fn get_cart_line(
        &self,
        line_id: CartLineId,
        user_id: UserId,
    ) -> Result<Option<CartLine>>;

    /// Inserts a new cart line. At most one line may exist per
    /// (user, product) pair; callers merge quantities before inserting.
    async fn insert_cart_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLine>;

    /// Sets the quantity of an existing cart line. Returns `None` if the
    /// line does not exist or is not owned by the user.
    async fn set_cart_line_quantity(
        &self,
        line_id: CartLineId,
        user_id: UserId,
        quantity: u32,
    ) -> Result<Option<CartLine>>;

    /// Removes one cart line. Returns whether a line was removed.
    async fn remove_cart_line(&self, line_id: CartLineId, user_id: UserId) -> Result<bool>;

    /// Removes all of a user's cart lines, returning how many.
    async fn clear_cart(&self, user_id: UserId) -> Result<u64>;

    /// Returns true if the address exists and belongs to the user.
    async fn address_owned_by(&self, address_id: AddressId, user_id: UserId) -> Result<bool>;

    /// Persists an order atomically: inserts the header with status
    /// `pending`, inserts one line item per quote line, clears the user's
    /// cart, and conditionally decrements stock for every line.
    ///
    /// If any decrement finds less stock than the line needs, the whole
    /// transaction is rolled back and
    /// [`StorageError::InsufficientStock`](crate::StorageError::InsufficientStock)
    /// is returned with the quantity available at write time. No partial
    /// state is ever observable.
    async fn persist_order(&self, order: NewOrder) -> Result<(OrderRecord, Vec<OrderItemRecord>)>;

    /// Atomically writes a new status and `updated_at` on an order.
    /// Returns the updated record, or `None` for an unknown order.
    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<OrderRecord>>;

    /// Fetches an order with its line items.
    async fn get_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<(OrderRecord, Vec<OrderItemRecord>)>>;

    /// Lists a user's orders, newest first, optionally filtered by status.
    async fn list_orders(
        &self,
        user_id: UserId,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderRecord>>;

    /// Adjusts a product's stock by `delta` (restock or manual correction),
    /// refusing atomically to go below zero. Returns the new quantity.
    async fn adjust_stock(&self, product_id: ProductId, delta: i32) -> Result<u32>;
}
