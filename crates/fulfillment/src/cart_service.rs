//! Cart maintenance ahead of checkout.

use common::{CartLineId, ProductId, UserId};
use domain::{CartLine, CartSnapshot};
use storage::FulfillmentStore;

use crate::error::{FulfillmentError, Result};

/// Cart reads and writes for one storefront.
///
/// Stock checks here are advisory, made against the product's stock at
/// write time; checkout remains the authority on oversell. Quantities
/// arrive as `i64` so out-of-range client values are rejected here
/// rather than truncated.
pub struct CartService<S> {
    store: S,
}

impl<S: FulfillmentStore> CartService<S> {
    /// Creates a cart service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Reads the user's current cart as a snapshot.
    pub async fn view_cart(&self, user_id: UserId) -> Result<CartSnapshot> {
        let lines = self.store.load_cart(user_id).await?;
        Ok(CartSnapshot::new(user_id, lines))
    }

    /// Adds a product to the cart, merging with an existing line for the
    /// same product. The merged quantity may not exceed current stock.
    #[tracing::instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartLine> {
        let quantity = validate_quantity(quantity)?;

        let product = self
            .store
            .get_product(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(FulfillmentError::ProductNotFound(product_id))?;

        let existing = self.store.find_cart_line(user_id, product_id).await?;
        let merged = existing.as_ref().map_or(0, |l| l.quantity) + quantity;

        if merged > product.stock_quantity {
            return Err(FulfillmentError::InsufficientStock {
                product_id,
                available: product.stock_quantity,
            });
        }

        match existing {
            Some(line) => self
                .store
                .set_cart_line_quantity(line.id, user_id, merged)
                .await?
                .ok_or(FulfillmentError::CartLineNotFound(line.id)),
            None => Ok(self
                .store
                .insert_cart_line(user_id, product_id, quantity)
                .await?),
        }
    }

    /// Replaces the quantity of an existing cart line.
    #[tracing::instrument(skip(self), fields(user_id = %user_id, line_id = %line_id))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        line_id: CartLineId,
        quantity: i64,
    ) -> Result<CartLine> {
        let quantity = validate_quantity(quantity)?;

        let line = self
            .store
            .get_cart_line(line_id, user_id)
            .await?
            .ok_or(FulfillmentError::CartLineNotFound(line_id))?;

        if quantity > line.stock_quantity {
            return Err(FulfillmentError::InsufficientStock {
                product_id: line.product_id,
                available: line.stock_quantity,
            });
        }

        self.store
            .set_cart_line_quantity(line_id, user_id, quantity)
            .await?
            .ok_or(FulfillmentError::CartLineNotFound(line_id))
    }

    /// Removes one line from the cart.
    pub async fn remove_item(&self, user_id: UserId, line_id: CartLineId) -> Result<()> {
        if self.store.remove_cart_line(line_id, user_id).await? {
            Ok(())
        } else {
            Err(FulfillmentError::CartLineNotFound(line_id))
        }
    }

    /// Removes every line from the user's cart.
    pub async fn clear(&self, user_id: UserId) -> Result<()> {
        self.store.clear_cart(user_id).await?;
        Ok(())
    }
}

fn validate_quantity(quantity: i64) -> Result<u32> {
    if quantity < 1 || quantity > i64::from(i32::MAX) {
        return Err(FulfillmentError::InvalidQuantity(quantity));
    }
    Ok(quantity as u32)
}
