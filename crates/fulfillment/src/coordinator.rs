//! The order fulfillment coordinator.

use common::{AddressId, OrderId, UserId};
use domain::{price, CartSnapshot, OrderStatus, PricingPolicy, ZeroRates};
use serde::{Deserialize, Serialize};
use storage::{FulfillmentStore, NewOrder, OrderItemRecord, OrderRecord};

use crate::error::{AddressKind, FulfillmentError, Result};

/// Parameters of one checkout attempt. Both address references and the
/// notes are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address_id: Option<AddressId>,
    pub billing_address_id: Option<AddressId>,
    pub notes: Option<String>,
}

/// A created order with its line items, annotated with the product names
/// captured in the cart snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order: OrderRecord,
    pub items: Vec<OrderItemRecord>,
}

/// Orchestrates checkout and the post-creation status lifecycle.
///
/// Checkout runs: load the cart snapshot, advisory stock check, address
/// validation, pricing, then one atomic persist of the whole write-set.
/// Validation failures are reported before any write happens; failures
/// inside the persist roll back in full. A retry after any failure is a
/// brand-new attempt against a freshly loaded cart.
pub struct FulfillmentCoordinator<S, P = ZeroRates> {
    store: S,
    policy: P,
}

impl<S: FulfillmentStore> FulfillmentCoordinator<S> {
    /// Creates a coordinator with the current storefront pricing policy
    /// (zero tax, free shipping).
    pub fn new(store: S) -> Self {
        Self::with_policy(store, ZeroRates)
    }
}

impl<S: FulfillmentStore, P: PricingPolicy> FulfillmentCoordinator<S, P> {
    /// Creates a coordinator with an explicit pricing policy.
    pub fn with_policy(store: S, policy: P) -> Self {
        Self { store, policy }
    }

    /// Converts the user's cart into an order.
    #[tracing::instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        request: CheckoutRequest,
    ) -> Result<PlacedOrder> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = std::time::Instant::now();

        let lines = self.store.load_cart(user_id).await?;
        let snapshot = CartSnapshot::new(user_id, lines);

        if snapshot.is_empty() {
            metrics::counter!("checkout_failures_total", "reason" => "empty_cart").increment(1);
            return Err(FulfillmentError::EmptyCart);
        }

        // Advisory check against the snapshot; the decrement inside the
        // persist re-checks at write time.
        if let Some(line) = snapshot.first_shortfall() {
            metrics::counter!("checkout_failures_total", "reason" => "insufficient_stock")
                .increment(1);
            return Err(FulfillmentError::InsufficientStock {
                product_id: line.product_id,
                available: line.stock_quantity,
            });
        }

        self.validate_address(user_id, request.shipping_address_id, AddressKind::Shipping)
            .await?;
        self.validate_address(user_id, request.billing_address_id, AddressKind::Billing)
            .await?;

        let quote = price(&snapshot, &self.policy);
        let notes = request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from);

        let (order, items) = self
            .store
            .persist_order(NewOrder {
                user_id,
                shipping_address_id: request.shipping_address_id,
                billing_address_id: request.billing_address_id,
                notes,
                quote,
            })
            .await?;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            order_id = %order.id,
            total = %order.total,
            items = items.len(),
            "order placed"
        );

        Ok(PlacedOrder { order, items })
    }

    async fn validate_address(
        &self,
        user_id: UserId,
        address_id: Option<AddressId>,
        kind: AddressKind,
    ) -> Result<()> {
        let Some(address_id) = address_id else {
            return Ok(());
        };
        if self.store.address_owned_by(address_id, user_id).await? {
            Ok(())
        } else {
            Err(FulfillmentError::InvalidAddress(kind))
        }
    }

    /// Writes a new status on an order. `status` must be one of the
    /// lowercase wire names, and the move from the order's current
    /// status is gated through [`OrderStatus::can_transition_to`].
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(&self, order_id: OrderId, status: &str) -> Result<OrderRecord> {
        let next: OrderStatus = status.parse()?;

        let (current, _) = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))?;
        if !current.status.can_transition_to(next) {
            return Err(FulfillmentError::ForbiddenTransition {
                from: current.status,
                to: next,
            });
        }

        self.store
            .update_order_status(order_id, next)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))
    }

    /// Fetches an order with its line items.
    pub async fn get_order(&self, order_id: OrderId) -> Result<PlacedOrder> {
        let (order, items) = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))?;
        Ok(PlacedOrder { order, items })
    }

    /// Lists a user's orders, newest first, optionally filtered by status.
    pub async fn list_orders(
        &self,
        user_id: UserId,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderRecord>> {
        Ok(self.store.list_orders(user_id, status).await?)
    }
}
