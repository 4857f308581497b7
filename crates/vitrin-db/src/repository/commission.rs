//! # Commission Repository
//!
//! Persistence for affiliate commissions.
//!
//! ## Idempotency Key
//! The table carries `UNIQUE(order_id, level)`. Creation first checks for
//! existing rows in the same transaction; the constraint is the backstop if
//! two payment callbacks race past that check.
//!
//! Status changes driven by order transitions (`make_available_for_order`,
//! `void_for_order`) run on the transition's connection so the order status
//! and its commission side effect commit together.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use vitrin_core::{Commission, CommissionStatus};

const COMMISSION_COLUMNS: &str = r#"
    id, affiliate_id, order_id, level, percentage, amount_cents, status,
    created_at, updated_at
"#;

/// Repository for commissions.
#[derive(Debug, Clone)]
pub struct CommissionRepository {
    pool: SqlitePool,
}

impl CommissionRepository {
    /// Creates a new CommissionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CommissionRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// All commissions attached to an order.
    pub async fn list_for_order(&self, order_id: &str) -> DbResult<Vec<Commission>> {
        let rows = sqlx::query_as::<_, Commission>(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM commissions WHERE order_id = ?1 ORDER BY level"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// An affiliate's commissions, newest first.
    pub async fn list_for_affiliate(&self, affiliate_id: &str) -> DbResult<Vec<Commission>> {
        let rows = sqlx::query_as::<_, Commission>(&format!(
            "SELECT {COMMISSION_COLUMNS} FROM commissions WHERE affiliate_id = ?1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(affiliate_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Sum of an affiliate's `available` commissions, in minor units.
    pub async fn available_balance(&self, affiliate_id: &str) -> DbResult<i64> {
        let sum: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(amount_cents) FROM commissions WHERE affiliate_id = ?1 AND status = 'available'",
        )
        .bind(affiliate_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum.unwrap_or(0))
    }

    /// Whether any commission rows exist for this order. The idempotency
    /// check for commission creation; runs on the caller's transaction.
    pub async fn exists_for_order(conn: &mut SqliteConnection, order_id: &str) -> DbResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM commissions WHERE order_id = ?1")
                .bind(order_id)
                .fetch_one(&mut *conn)
                .await?;

        Ok(count > 0)
    }

    /// An affiliate's `available` commissions in FIFO order (oldest first).
    /// Payout settlement consumes from the head of this list.
    pub async fn available_fifo(
        conn: &mut SqliteConnection,
        affiliate_id: &str,
    ) -> DbResult<Vec<Commission>> {
        let rows = sqlx::query_as::<_, Commission>(&format!(
            r#"
            SELECT {COMMISSION_COLUMNS}
            FROM commissions
            WHERE affiliate_id = ?1 AND status = 'available'
            ORDER BY created_at, id
            "#
        ))
        .bind(affiliate_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts a commission row.
    pub async fn insert(conn: &mut SqliteConnection, commission: &Commission) -> DbResult<()> {
        debug!(
            order_id = %commission.order_id,
            level = commission.level,
            amount = commission.amount_cents,
            "Inserting commission"
        );

        sqlx::query(
            r#"
            INSERT INTO commissions (
                id, affiliate_id, order_id, level, percentage, amount_cents,
                status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&commission.id)
        .bind(&commission.affiliate_id)
        .bind(&commission.order_id)
        .bind(commission.level)
        .bind(commission.percentage)
        .bind(commission.amount_cents)
        .bind(commission.status)
        .bind(commission.created_at)
        .bind(commission.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Flips an order's `pending` commissions to `available` (delivery).
    /// Returns how many rows moved; rows already past `pending` are left
    /// alone, which keeps repeated delivery processing harmless.
    pub async fn make_available_for_order(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<u64> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE commissions SET status = 'available', updated_at = ?2
            WHERE order_id = ?1 AND status = 'pending'
            "#,
        )
        .bind(order_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Voids an order's `pending` and `available` commissions (cancel,
    /// refund, return). `paid` rows are terminal and stay paid.
    pub async fn void_for_order(conn: &mut SqliteConnection, order_id: &str) -> DbResult<u64> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE commissions SET status = 'void', updated_at = ?2
            WHERE order_id = ?1 AND status IN ('pending', 'available')
            "#,
        )
        .bind(order_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Marks one commission `paid`, guarded on it still being `available`.
    /// Returns `false` when a competing payout consumed it first.
    pub async fn mark_paid(conn: &mut SqliteConnection, commission_id: &str) -> DbResult<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE commissions SET status = 'paid', updated_at = ?2
            WHERE id = ?1 AND status = 'available'
            "#,
        )
        .bind(commission_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::order::OrderRepository;
    use chrono::Utc;
    use uuid::Uuid;
    use vitrin_core::{Affiliate, Order, OrderStatus};

    async fn setup_order_with_affiliate(db: &Database) -> (String, String) {
        let now = Utc::now();
        let affiliate = Affiliate {
            id: "aff-1".into(),
            display_name: "Sara".into(),
            parent_affiliate_id: None,
            bank_iban: Some("IR820540102680020817909002".into()),
            bank_holder: Some("Sara".into()),
            is_active: true,
            created_at: now,
        };
        db.affiliates().insert(&affiliate).await.unwrap();

        let order = Order {
            id: Uuid::new_v4().to_string(),
            customer_id: "cust-1".into(),
            status: OrderStatus::Processing,
            subtotal_cents: 150_000,
            shipping_cents: 0,
            total_cents: 150_000,
            ref_affiliate_id: Some("aff-1".into()),
            authority_token: None,
            settlement_ref: None,
            shipping_address: "42 Main St".into(),
            created_at: now,
            updated_at: now,
        };
        let mut tx = db.pool().begin().await.unwrap();
        OrderRepository::insert(&mut tx, &order).await.unwrap();
        tx.commit().await.unwrap();

        ("aff-1".to_string(), order.id)
    }

    fn commission(affiliate_id: &str, order_id: &str, level: i64, amount: i64) -> Commission {
        let now = Utc::now();
        Commission {
            id: Uuid::new_v4().to_string(),
            affiliate_id: affiliate_id.to_string(),
            order_id: order_id.to_string(),
            level,
            percentage: 5,
            amount_cents: amount,
            status: CommissionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_unique_order_level_backstop() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (aff, order_id) = setup_order_with_affiliate(&db).await;

        let mut tx = db.pool().begin().await.unwrap();
        CommissionRepository::insert(&mut tx, &commission(&aff, &order_id, 1, 7_500))
            .await
            .unwrap();
        let dup = CommissionRepository::insert(&mut tx, &commission(&aff, &order_id, 1, 7_500)).await;
        assert!(dup.is_err());
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_lifecycle_and_balance() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (aff, order_id) = setup_order_with_affiliate(&db).await;

        let mut tx = db.pool().begin().await.unwrap();
        CommissionRepository::insert(&mut tx, &commission(&aff, &order_id, 1, 7_500))
            .await
            .unwrap();
        assert!(CommissionRepository::exists_for_order(&mut tx, &order_id).await.unwrap());
        tx.commit().await.unwrap();

        let repo = db.commissions();
        assert_eq!(repo.available_balance(&aff).await.unwrap(), 0);

        let mut tx = db.pool().begin().await.unwrap();
        let moved = CommissionRepository::make_available_for_order(&mut tx, &order_id)
            .await
            .unwrap();
        assert_eq!(moved, 1);
        // Re-running the delivery side effect moves nothing further.
        let again = CommissionRepository::make_available_for_order(&mut tx, &order_id)
            .await
            .unwrap();
        assert_eq!(again, 0);
        tx.commit().await.unwrap();

        assert_eq!(repo.available_balance(&aff).await.unwrap(), 7_500);
    }

    #[tokio::test]
    async fn test_void_spares_paid_rows() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (aff, order_id) = setup_order_with_affiliate(&db).await;

        let c = commission(&aff, &order_id, 1, 7_500);
        let mut tx = db.pool().begin().await.unwrap();
        CommissionRepository::insert(&mut tx, &c).await.unwrap();
        CommissionRepository::make_available_for_order(&mut tx, &order_id)
            .await
            .unwrap();
        assert!(CommissionRepository::mark_paid(&mut tx, &c.id).await.unwrap());

        let voided = CommissionRepository::void_for_order(&mut tx, &order_id).await.unwrap();
        assert_eq!(voided, 0);
        tx.commit().await.unwrap();

        let rows = db.commissions().list_for_order(&order_id).await.unwrap();
        assert_eq!(rows[0].status, CommissionStatus::Paid);
    }
}
