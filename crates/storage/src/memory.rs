use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{AddressId, CartLineId, OrderId, ProductId, UserId};
use domain::{CartLine, OrderStatus};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::records::{NewOrder, OrderItemRecord, OrderRecord, ProductRecord};
use crate::store::FulfillmentStore;

#[derive(Debug, Clone)]
struct StoredCartLine {
    id: CartLineId,
    user_id: UserId,
    product_id: ProductId,
    quantity: u32,
    created_at: chrono::DateTime<Utc>,
    seq: u64,
}

#[derive(Default)]
struct InMemoryState {
    products: HashMap<ProductId, ProductRecord>,
    addresses: HashMap<AddressId, UserId>,
    cart: Vec<StoredCartLine>,
    orders: Vec<(OrderRecord, Vec<OrderItemRecord>)>,
    next_seq: u64,
}

impl InMemoryState {
    fn join_line(&self, stored: &StoredCartLine) -> Option<CartLine> {
        let product = self.products.get(&stored.product_id)?;
        Some(CartLine {
            id: stored.id,
            product_id: stored.product_id,
            product_name: product.name.clone(),
            quantity: stored.quantity,
            unit_price: product.price,
            stock_quantity: product.stock_quantity,
            created_at: stored.created_at,
        })
    }
}

/// In-memory fulfillment store for testing.
///
/// All state sits behind a single write lock, and `persist_order`
/// validates every stock decrement before applying any write, so it
/// exhibits the same all-or-nothing checkout semantics as the
/// PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a product and returns its id.
    pub async fn insert_product(
        &self,
        name: impl Into<String>,
        price: common::Money,
        stock_quantity: u32,
    ) -> ProductId {
        let id = ProductId::new();
        self.state.write().await.products.insert(
            id,
            ProductRecord {
                id,
                name: name.into(),
                price,
                stock_quantity,
                is_active: true,
            },
        );
        id
    }

    /// Activates or deactivates a seeded product.
    pub async fn set_product_active(&self, product_id: ProductId, is_active: bool) {
        if let Some(product) = self.state.write().await.products.get_mut(&product_id) {
            product.is_active = is_active;
        }
    }

    /// Seeds an address owned by the given user and returns its id.
    pub async fn insert_address(&self, user_id: UserId) -> AddressId {
        let id = AddressId::new();
        self.state.write().await.addresses.insert(id, user_id);
        id
    }

    /// Current stock of a seeded product.
    pub async fn stock_of(&self, product_id: ProductId) -> Option<u32> {
        self.state
            .read()
            .await
            .products
            .get(&product_id)
            .map(|p| p.stock_quantity)
    }

    /// Number of orders persisted so far.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl FulfillmentStore for InMemoryStore {
    async fn load_cart(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let state = self.state.read().await;
        let mut stored: Vec<&StoredCartLine> = state
            .cart
            .iter()
            .filter(|l| l.user_id == user_id)
            .filter(|l| state.products.get(&l.product_id).is_some_and(|p| p.is_active))
            .collect();
        stored.sort_by(|a, b| (b.created_at, b.seq).cmp(&(a.created_at, a.seq)));

        Ok(stored
            .into_iter()
            .filter_map(|l| state.join_line(l))
            .collect())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<ProductRecord>> {
        Ok(self.state.read().await.products.get(&product_id).cloned())
    }

    async fn find_cart_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>> {
        let state = self.state.read().await;
        Ok(state
            .cart
            .iter()
            .find(|l| l.user_id == user_id && l.product_id == product_id)
            .and_then(|l| state.join_line(l)))
    }

    async fn get_cart_line(
        &self,
        line_id: CartLineId,
        user_id: UserId,
    ) -> Result<Option<CartLine>> {
        let state = self.state.read().await;
        Ok(state
            .cart
            .iter()
            .find(|l| l.id == line_id && l.user_id == user_id)
            .and_then(|l| state.join_line(l)))
    }

    async fn insert_cart_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLine> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&product_id) {
            return Err(StorageError::ProductNotFound(product_id));
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        let stored = StoredCartLine {
            id: CartLineId::new(),
            user_id,
            product_id,
            quantity,
            created_at: Utc::now(),
            seq,
        };
        let line = state
            .join_line(&stored)
            .ok_or(StorageError::ProductNotFound(product_id))?;
        state.cart.push(stored);
        Ok(line)
    }

    async fn set_cart_line_quantity(
        &self,
        line_id: CartLineId,
        user_id: UserId,
        quantity: u32,
    ) -> Result<Option<CartLine>> {
        let mut state = self.state.write().await;
        let Some(stored) = state
            .cart
            .iter_mut()
            .find(|l| l.id == line_id && l.user_id == user_id)
        else {
            return Ok(None);
        };
        stored.quantity = quantity;
        let stored = stored.clone();
        Ok(state.join_line(&stored))
    }

    async fn remove_cart_line(&self, line_id: CartLineId, user_id: UserId) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.cart.len();
        state
            .cart
            .retain(|l| !(l.id == line_id && l.user_id == user_id));
        Ok(state.cart.len() < before)
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.cart.len();
        state.cart.retain(|l| l.user_id != user_id);
        Ok((before - state.cart.len()) as u64)
    }

    async fn address_owned_by(&self, address_id: AddressId, user_id: UserId) -> Result<bool> {
        Ok(self.state.read().await.addresses.get(&address_id) == Some(&user_id))
    }

    async fn persist_order(&self, order: NewOrder) -> Result<(OrderRecord, Vec<OrderItemRecord>)> {
        let NewOrder {
            user_id,
            shipping_address_id,
            billing_address_id,
            notes,
            quote,
        } = order;

        let mut state = self.state.write().await;

        // Validate every decrement before applying any write so a failed
        // checkout leaves no partial state, as a rolled-back transaction
        // would. Lines are visited in product-id order, matching the
        // lock-acquisition order of the PostgreSQL store.
        let mut decrements: Vec<_> = quote.lines.iter().collect();
        decrements.sort_by_key(|line| line.product_id);
        for line in &decrements {
            let product = state
                .products
                .get(&line.product_id)
                .ok_or(StorageError::ProductNotFound(line.product_id))?;
            if product.stock_quantity < line.quantity {
                return Err(StorageError::InsufficientStock {
                    product_id: line.product_id,
                    available: product.stock_quantity,
                });
            }
        }

        for line in &decrements {
            if let Some(product) = state.products.get_mut(&line.product_id) {
                product.stock_quantity -= line.quantity;
            }
        }
        state.cart.retain(|l| l.user_id != user_id);

        let order_id = OrderId::new();
        let now = Utc::now();
        let items: Vec<OrderItemRecord> = quote
            .lines
            .iter()
            .map(|line| OrderItemRecord {
                id: Uuid::new_v4(),
                order_id,
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                total_price: line.total_price,
            })
            .collect();

        let record = OrderRecord {
            id: order_id,
            user_id,
            shipping_address_id,
            billing_address_id,
            status: OrderStatus::Pending,
            subtotal: quote.subtotal,
            tax: quote.tax,
            shipping_cost: quote.shipping,
            total: quote.total,
            notes,
            created_at: now,
            updated_at: now,
        };

        state.orders.push((record.clone(), items.clone()));
        Ok((record, items))
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<OrderRecord>> {
        let mut state = self.state.write().await;
        let Some((record, _)) = state.orders.iter_mut().find(|(o, _)| o.id == order_id) else {
            return Ok(None);
        };
        record.status = status;
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn get_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<(OrderRecord, Vec<OrderItemRecord>)>> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .iter()
            .find(|(o, _)| o.id == order_id)
            .cloned())
    }

    async fn list_orders(
        &self,
        user_id: UserId,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderRecord>> {
        let state = self.state.read().await;
        let mut orders: Vec<OrderRecord> = state
            .orders
            .iter()
            .map(|(o, _)| o)
            .filter(|o| o.user_id == user_id)
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn adjust_stock(&self, product_id: ProductId, delta: i32) -> Result<u32> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(StorageError::ProductNotFound(product_id))?;

        let new_quantity = i64::from(product.stock_quantity) + i64::from(delta);
        if new_quantity < 0 {
            return Err(StorageError::InsufficientStock {
                product_id,
                available: product.stock_quantity,
            });
        }
        product.stock_quantity = new_quantity as u32;
        Ok(product.stock_quantity)
    }
}
