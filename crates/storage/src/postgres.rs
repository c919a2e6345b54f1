use chrono::{DateTime, Utc};
use common::{AddressId, CartLineId, Money, OrderId, ProductId, UserId};
use domain::{CartLine, OrderStatus};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::records::{NewOrder, OrderItemRecord, OrderRecord, ProductRecord};
use crate::store::FulfillmentStore;

use async_trait::async_trait;

const CART_LINE_COLUMNS: &str = r#"
    SELECT c.id, c.product_id, c.quantity, c.created_at,
           p.name, p.price_cents, p.stock_quantity
    FROM cart_items c
    JOIN products p ON c.product_id = p.id
"#;

const ORDER_COLUMNS: &str = r#"
    id, user_id, shipping_address_id, billing_address_id, status,
    subtotal_cents, tax_cents, shipping_cents, total_cents, notes,
    created_at, updated_at
"#;

/// PostgreSQL-backed fulfillment store.
///
/// The conditional stock decrement is expressed as a single guarded
/// `UPDATE` so the stock predicate is re-evaluated under the row lock at
/// write time; concurrent checkouts can never collectively oversell.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool from the given configuration.
    ///
    /// The configured statement timeout is applied to every connection so
    /// a stuck transaction aborts (and rolls back) instead of holding row
    /// locks indefinitely.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let options = config
            .database_url
            .parse::<PgConnectOptions>()?
            .options([("statement_timeout", config.statement_timeout_ms.to_string())]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_cart_line(row: PgRow) -> Result<CartLine> {
        Ok(CartLine {
            id: CartLineId::from_uuid(row.try_get::<Uuid, _>("id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            product_name: row.try_get("name")?,
            quantity: row.try_get::<i32, _>("quantity")?.max(0) as u32,
            unit_price: Money::from_cents(row.try_get("price_cents")?),
            stock_quantity: row.try_get::<i32, _>("stock_quantity")?.max(0) as u32,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<OrderRecord> {
        let status: OrderStatus = row.try_get::<String, _>("status")?.parse()?;
        Ok(OrderRecord {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            shipping_address_id: row
                .try_get::<Option<Uuid>, _>("shipping_address_id")?
                .map(AddressId::from_uuid),
            billing_address_id: row
                .try_get::<Option<Uuid>, _>("billing_address_id")?
                .map(AddressId::from_uuid),
            status,
            subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
            tax: Money::from_cents(row.try_get("tax_cents")?),
            shipping_cost: Money::from_cents(row.try_get("shipping_cents")?),
            total: Money::from_cents(row.try_get("total_cents")?),
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order_item(row: PgRow) -> Result<OrderItemRecord> {
        Ok(OrderItemRecord {
            id: row.try_get("id")?,
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            product_name: row.try_get("product_name")?,
            quantity: row.try_get::<i32, _>("quantity")?.max(0) as u32,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            total_price: Money::from_cents(row.try_get("total_price_cents")?),
        })
    }

    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, product_name, quantity,
                   unit_price_cents, total_price_cents
            FROM order_items
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order_item).collect()
    }
}

#[async_trait]
impl FulfillmentStore for PostgresStore {
    async fn load_cart(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let sql = format!(
            "{CART_LINE_COLUMNS} WHERE c.user_id = $1 AND p.is_active = TRUE \
             ORDER BY c.created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_cart_line).collect()
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(
            "SELECT id, name, price_cents, stock_quantity, is_active FROM products WHERE id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(ProductRecord {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock_quantity: row.try_get::<i32, _>("stock_quantity")?.max(0) as u32,
            is_active: row.try_get("is_active")?,
        }))
    }

    async fn find_cart_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>> {
        let sql = format!("{CART_LINE_COLUMNS} WHERE c.user_id = $1 AND c.product_id = $2");
        let row = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .bind(product_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_cart_line).transpose()
    }

    async fn get_cart_line(
        &self,
        line_id: CartLineId,
        user_id: UserId,
    ) -> Result<Option<CartLine>> {
        let sql = format!("{CART_LINE_COLUMNS} WHERE c.id = $1 AND c.user_id = $2");
        let row = sqlx::query(&sql)
            .bind(line_id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_cart_line).transpose()
    }

    async fn insert_cart_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLine> {
        let line_id = CartLineId::new();
        sqlx::query(
            "INSERT INTO cart_items (id, user_id, product_id, quantity) VALUES ($1, $2, $3, $4)",
        )
        .bind(line_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(quantity as i32)
        .execute(&self.pool)
        .await?;

        self.get_cart_line(line_id, user_id)
            .await?
            .ok_or(StorageError::ProductNotFound(product_id))
    }

    async fn set_cart_line_quantity(
        &self,
        line_id: CartLineId,
        user_id: UserId,
        quantity: u32,
    ) -> Result<Option<CartLine>> {
        let updated = sqlx::query(
            "UPDATE cart_items SET quantity = $1 WHERE id = $2 AND user_id = $3",
        )
        .bind(quantity as i32)
        .bind(line_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_cart_line(line_id, user_id).await
    }

    async fn remove_cart_line(&self, line_id: CartLineId, user_id: UserId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(line_id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(deleted.rows_affected() > 0)
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(deleted.rows_affected())
    }

    async fn address_owned_by(&self, address_id: AddressId, user_id: UserId) -> Result<bool> {
        let row = sqlx::query("SELECT id FROM addresses WHERE id = $1 AND user_id = $2")
            .bind(address_id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    async fn persist_order(&self, order: NewOrder) -> Result<(OrderRecord, Vec<OrderItemRecord>)> {
        let NewOrder {
            user_id,
            shipping_address_id,
            billing_address_id,
            notes,
            quote,
        } = order;

        let order_id = OrderId::new();
        let mut tx = self.pool.begin().await?;

        let header = sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, shipping_address_id, billing_address_id, status,
                                subtotal_cents, tax_cents, shipping_cents, total_cents, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING created_at, updated_at
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(shipping_address_id.map(|a| a.as_uuid()))
        .bind(billing_address_id.map(|a| a.as_uuid()))
        .bind(OrderStatus::Pending.as_str())
        .bind(quote.subtotal.cents())
        .bind(quote.tax.cents())
        .bind(quote.shipping.cents())
        .bind(quote.total.cents())
        .bind(notes.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        let created_at: DateTime<Utc> = header.try_get("created_at")?;
        let updated_at: DateTime<Utc> = header.try_get("updated_at")?;

        let mut items = Vec::with_capacity(quote.lines.len());
        for line in &quote.lines {
            let item_id = Uuid::new_v4();
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, product_name, quantity,
                                         unit_price_cents, total_price_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item_id)
            .bind(order_id.as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(&line.product_name)
            .bind(line.quantity as i32)
            .bind(line.unit_price.cents())
            .bind(line.total_price.cents())
            .execute(&mut *tx)
            .await?;

            items.push(OrderItemRecord {
                id: item_id,
                order_id,
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                total_price: line.total_price,
            });
        }

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        // The authoritative oversell guard: the stock predicate is
        // re-evaluated under the row lock, regardless of what the
        // advisory snapshot check observed. Rows are decremented in
        // product-id order so concurrent checkouts that share products
        // acquire their locks in the same global order and cannot
        // deadlock on each other.
        let mut decrements: Vec<_> = quote.lines.iter().collect();
        decrements.sort_by_key(|line| line.product_id);
        for line in decrements {
            let updated = sqlx::query(
                r#"
                UPDATE products SET stock_quantity = stock_quantity - $1
                WHERE id = $2 AND stock_quantity >= $1
                "#,
            )
            .bind(line.quantity as i32)
            .bind(line.product_id.as_uuid())
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                let available: Option<i32> =
                    sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = $1")
                        .bind(line.product_id.as_uuid())
                        .fetch_optional(&mut *tx)
                        .await?;

                tx.rollback().await?;
                tracing::warn!(
                    product_id = %line.product_id,
                    requested = line.quantity,
                    available = available.unwrap_or(0),
                    "checkout aborted on stock decrement"
                );
                return Err(StorageError::InsufficientStock {
                    product_id: line.product_id,
                    available: available.unwrap_or(0).max(0) as u32,
                });
            }
        }

        tx.commit().await?;

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
            created_at,
            updated_at,
        };

        Ok((record, items))
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<OrderRecord>> {
        let sql = format!(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 \
             RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn get_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<(OrderRecord, Vec<OrderItemRecord>)>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order = Self::row_to_order(row)?;
        let items = self.order_items(order_id).await?;
        Ok(Some((order, items)))
    }

    async fn list_orders(
        &self,
        user_id: UserId,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderRecord>> {
        let rows = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {ORDER_COLUMNS} FROM orders \
                     WHERE user_id = $1 AND status = $2 ORDER BY created_at DESC"
                );
                sqlx::query(&sql)
                    .bind(user_id.as_uuid())
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {ORDER_COLUMNS} FROM orders \
                     WHERE user_id = $1 ORDER BY created_at DESC"
                );
                sqlx::query(&sql)
                    .bind(user_id.as_uuid())
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn adjust_stock(&self, product_id: ProductId, delta: i32) -> Result<u32> {
        let new_quantity: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products SET stock_quantity = stock_quantity + $1
            WHERE id = $2 AND stock_quantity + $1 >= 0
            RETURNING stock_quantity
            "#,
        )
        .bind(delta)
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match new_quantity {
            Some(quantity) => Ok(quantity.max(0) as u32),
            None => {
                let available: Option<i32> =
                    sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = $1")
                        .bind(product_id.as_uuid())
                        .fetch_optional(&self.pool)
                        .await?;

                match available {
                    Some(available) => Err(StorageError::InsufficientStock {
                        product_id,
                        available: available.max(0) as u32,
                    }),
                    None => Err(StorageError::ProductNotFound(product_id)),
                }
            }
        }
    }
}
