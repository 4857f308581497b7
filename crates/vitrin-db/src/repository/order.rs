//! # Order Repository
//!
//! Persistence for orders and their line items.
//!
//! ## Status Updates Are Compare-and-Swap
//! The `status` column is only ever written through [`OrderRepository::
//! update_status`], which carries the expected current status in its WHERE
//! clause. A concurrent transition that got there first leaves the statement
//! matching zero rows, and the caller re-reads to classify what happened.
//! Orders are never deleted; terminal states stay queryable.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use vitrin_core::{Order, OrderItem, OrderStatus};

const ORDER_COLUMNS: &str = r#"
    id, customer_id, status, subtotal_cents, shipping_cents, total_cents,
    ref_affiliate_id, authority_token, settlement_ref, shipping_address,
    created_at, updated_at
"#;

/// Repository for orders and order items.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an order by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets an order by its ID, failing if absent.
    pub async fn get_required(&self, id: &str) -> DbResult<Order> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }

    /// Lists a customer's orders, newest first.
    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = ?1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Line items inside an open transaction. Transitions with stock side
    /// effects need the quantities in the same transaction that releases or
    /// restocks them.
    pub async fn items_for_order_tx(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, variant_id, quantity,
                   unit_price_cents, line_total_cents, created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts an order row. Part of the checkout transaction, alongside the
    /// stock reservations and line items.
    pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(order_id = %order.id, total = order.total_cents, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, customer_id, status, subtotal_cents, shipping_cents,
                total_cents, ref_affiliate_id, authority_token, settlement_ref,
                shipping_address, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&order.id)
        .bind(&order.customer_id)
        .bind(order.status)
        .bind(order.subtotal_cents)
        .bind(order.shipping_cents)
        .bind(order.total_cents)
        .bind(&order.ref_affiliate_id)
        .bind(&order.authority_token)
        .bind(&order.settlement_ref)
        .bind(&order.shipping_address)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts a line item with its frozen price snapshot.
    pub async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, product_id, variant_id, quantity,
                unit_price_cents, line_total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.product_id)
        .bind(&item.variant_id)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.line_total_cents)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Compare-and-swap status update: moves the order from `from` to `to`,
    /// returning `false` when the order was no longer in `from`.
    pub async fn update_status(
        conn: &mut SqliteConnection,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> DbResult<bool> {
        debug!(order_id = %order_id, ?from, ?to, "Updating order status");

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE orders SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        )
        .bind(order_id)
        .bind(from)
        .bind(to)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Records the gateway session token, but only if none is set yet.
    /// Returns `false` when a token already exists (the caller re-reads and
    /// reuses it, keeping session creation idempotent).
    pub async fn set_authority_token(&self, order_id: &str, token: &str) -> DbResult<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE orders SET authority_token = ?2, updated_at = ?3
            WHERE id = ?1 AND authority_token IS NULL
            "#,
        )
        .bind(order_id)
        .bind(token)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Records the gateway settlement reference. Part of the payment-success
    /// transaction.
    pub async fn set_settlement_ref(
        conn: &mut SqliteConnection,
        order_id: &str,
        settlement_ref: &str,
    ) -> DbResult<()> {
        let now = Utc::now();
        sqlx::query("UPDATE orders SET settlement_ref = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(order_id)
            .bind(settlement_ref)
            .bind(now)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use uuid::Uuid;

    fn sample_order(id: &str) -> Order {
        let now = Utc::now();
        Order {
            id: id.to_string(),
            customer_id: "cust-1".into(),
            status: OrderStatus::Pending,
            subtotal_cents: 150_000,
            shipping_cents: 0,
            total_cents: 150_000,
            ref_affiliate_id: None,
            authority_token: None,
            settlement_ref: None,
            shipping_address: "42 Main St".into(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = setup().await;
        let order = sample_order(&Uuid::new_v4().to_string());

        let mut tx = db.pool().begin().await.unwrap();
        OrderRepository::insert(&mut tx, &order).await.unwrap();
        tx.commit().await.unwrap();

        let found = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(found.status, OrderStatus::Pending);
        assert_eq!(found.total_cents, 150_000);
        assert!(found.authority_token.is_none());
    }

    #[tokio::test]
    async fn test_status_cas_only_matches_expected_from() {
        let db = setup().await;
        let order = sample_order(&Uuid::new_v4().to_string());

        let mut tx = db.pool().begin().await.unwrap();
        OrderRepository::insert(&mut tx, &order).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let moved =
            OrderRepository::update_status(&mut tx, &order.id, OrderStatus::Pending, OrderStatus::Processing)
                .await
                .unwrap();
        assert!(moved);

        // Second CAS from pending must miss: the row is now processing.
        let stale =
            OrderRepository::update_status(&mut tx, &order.id, OrderStatus::Pending, OrderStatus::Canceled)
                .await
                .unwrap();
        assert!(!stale);
        tx.commit().await.unwrap();

        let found = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(found.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_authority_token_set_once() {
        let db = setup().await;
        let order = sample_order(&Uuid::new_v4().to_string());

        let mut tx = db.pool().begin().await.unwrap();
        OrderRepository::insert(&mut tx, &order).await.unwrap();
        tx.commit().await.unwrap();

        let orders = db.orders();
        assert!(orders.set_authority_token(&order.id, "AUTH-1").await.unwrap());
        assert!(!orders.set_authority_token(&order.id, "AUTH-2").await.unwrap());

        let found = orders.get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(found.authority_token.as_deref(), Some("AUTH-1"));
    }
}
