//! # Payout Repository
//!
//! Persistence for affiliate payout requests.
//!
//! ## Balance Checks Live in the Statement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │         Concurrent Payout Requests Against One Balance                  │
//! │                                                                         │
//! │  available balance = SUM(available commissions)                         │
//! │                    - SUM(pending/approved payout requests)              │
//! │                                                                         │
//! │  Request A ──► INSERT ... SELECT ... WHERE balance = amount  ──► 1 row  │
//! │  Request B ──► same statement, now sees A reserving the      ──► 0 rows │
//! │                balance, guard fails                                     │
//! │                                                                         │
//! │  SQLite's single writer serializes the two statements; each one         │
//! │  evaluates its aggregate against the latest committed state. Exactly    │
//! │  one request per balance can succeed.                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use vitrin_core::PayoutRequest;

const PAYOUT_COLUMNS: &str = r#"
    id, affiliate_id, amount_cents, status, created_at, updated_at
"#;

/// Repository for payout requests.
#[derive(Debug, Clone)]
pub struct PayoutRepository {
    pool: SqlitePool,
}

impl PayoutRepository {
    /// Creates a new PayoutRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PayoutRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a payout request by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<PayoutRequest>> {
        let payout = sqlx::query_as::<_, PayoutRequest>(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM payout_requests WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payout)
    }

    /// Gets a payout request by its ID, failing if absent.
    pub async fn get_required(&self, id: &str) -> DbResult<PayoutRequest> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("PayoutRequest", id))
    }

    /// An affiliate's payout requests, newest first.
    pub async fn list_for_affiliate(&self, affiliate_id: &str) -> DbResult<Vec<PayoutRequest>> {
        let payouts = sqlx::query_as::<_, PayoutRequest>(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM payout_requests WHERE affiliate_id = ?1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(affiliate_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payouts)
    }

    /// Amount currently locked by the affiliate's pending and approved
    /// requests.
    pub async fn reserved_amount(&self, affiliate_id: &str) -> DbResult<i64> {
        let sum: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(amount_cents) FROM payout_requests
            WHERE affiliate_id = ?1 AND status IN ('pending', 'approved')
            "#,
        )
        .bind(affiliate_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum.unwrap_or(0))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Creates a payout request, but only if `amount_cents` equals the
    /// affiliate's unreserved available balance at write time. The whole
    /// check-and-insert is one statement, so a concurrent request cannot
    /// slip between the read and the write.
    ///
    /// Returns `false` when the guard failed; the caller re-reads the
    /// balances to report what the affiliate can actually request.
    pub async fn insert_if_exact_balance(&self, payout: &PayoutRequest) -> DbResult<bool> {
        debug!(
            affiliate_id = %payout.affiliate_id,
            amount = payout.amount_cents,
            "Creating payout request"
        );

        let result = sqlx::query(
            r#"
            INSERT INTO payout_requests (
                id, affiliate_id, amount_cents, status, created_at, updated_at
            )
            SELECT ?1, ?2, ?3, 'pending', ?4, ?4
            WHERE (
                (SELECT COALESCE(SUM(amount_cents), 0) FROM commissions
                 WHERE affiliate_id = ?2 AND status = 'available')
                -
                (SELECT COALESCE(SUM(amount_cents), 0) FROM payout_requests
                 WHERE affiliate_id = ?2 AND status IN ('pending', 'approved'))
            ) = ?3
            "#,
        )
        .bind(&payout.id)
        .bind(&payout.affiliate_id)
        .bind(payout.amount_cents)
        .bind(payout.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Approves a pending request, re-verifying that the balance still
    /// covers it (the order behind a commission may have been refunded since
    /// the request was made). Other live requests are excluded from the
    /// reservation so a request does not block its own approval.
    pub async fn approve_if_covered(&self, payout_id: &str) -> DbResult<bool> {
        debug!(payout_id = %payout_id, "Approving payout request");

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE payout_requests
            SET status = 'approved', updated_at = ?2
            WHERE id = ?1 AND status = 'pending'
              AND amount_cents <= (
                (SELECT COALESCE(SUM(amount_cents), 0) FROM commissions
                 WHERE affiliate_id = payout_requests.affiliate_id
                   AND status = 'available')
                -
                (SELECT COALESCE(SUM(amount_cents), 0) FROM payout_requests AS other
                 WHERE other.affiliate_id = payout_requests.affiliate_id
                   AND other.status IN ('pending', 'approved')
                   AND other.id != ?1)
              )
            "#,
        )
        .bind(payout_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Marks an approved request `paid`, guarded on the current status.
    /// Runs on the settlement transaction so the status flip and the
    /// consumed commissions commit together.
    pub async fn mark_paid(conn: &mut SqliteConnection, payout_id: &str) -> DbResult<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE payout_requests SET status = 'paid', updated_at = ?2
            WHERE id = ?1 AND status = 'approved'
            "#,
        )
        .bind(payout_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Rejects a pending or approved request, releasing its reservation.
    /// `paid` is terminal and cannot be rejected.
    pub async fn reject(&self, payout_id: &str) -> DbResult<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE payout_requests SET status = 'rejected', updated_at = ?2
            WHERE id = ?1 AND status IN ('pending', 'approved')
            "#,
        )
        .bind(payout_id)
        .bind(now)
        .execute(&self.pool)
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
    use crate::repository::commission::CommissionRepository;
    use crate::repository::order::OrderRepository;
    use chrono::Utc;
    use uuid::Uuid;
    use vitrin_core::{Affiliate, Commission, CommissionStatus, Order, OrderStatus, PayoutStatus};

    /// Seeds an affiliate with one delivered order worth `amount` in
    /// available commission.
    async fn setup_available_balance(db: &Database, amount: i64) -> String {
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
            status: OrderStatus::Delivered,
            subtotal_cents: amount * 20,
            shipping_cents: 0,
            total_cents: amount * 20,
            ref_affiliate_id: Some("aff-1".into()),
            authority_token: None,
            settlement_ref: None,
            shipping_address: "42 Main St".into(),
            created_at: now,
            updated_at: now,
        };

        let mut tx = db.pool().begin().await.unwrap();
        OrderRepository::insert(&mut tx, &order).await.unwrap();
        CommissionRepository::insert(
            &mut tx,
            &Commission {
                id: Uuid::new_v4().to_string(),
                affiliate_id: "aff-1".into(),
                order_id: order.id.clone(),
                level: 1,
                percentage: 5,
                amount_cents: amount,
                status: CommissionStatus::Available,
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        "aff-1".to_string()
    }

    fn payout(affiliate_id: &str, amount: i64) -> PayoutRequest {
        let now = Utc::now();
        PayoutRequest {
            id: Uuid::new_v4().to_string(),
            affiliate_id: affiliate_id.to_string(),
            amount_cents: amount,
            status: PayoutStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_exact_balance_required() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let aff = setup_available_balance(&db, 150_000).await;
        let repo = db.payouts();

        // Partial amounts are refused even though they are covered.
        assert!(!repo.insert_if_exact_balance(&payout(&aff, 100_000)).await.unwrap());
        assert!(!repo.insert_if_exact_balance(&payout(&aff, 150_001)).await.unwrap());

        assert!(repo.insert_if_exact_balance(&payout(&aff, 150_000)).await.unwrap());

        // The first request reserves the whole balance; a second one finds
        // nothing left.
        assert!(!repo.insert_if_exact_balance(&payout(&aff, 150_000)).await.unwrap());
    }

    #[tokio::test]
    async fn test_approve_and_reject_guards() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let aff = setup_available_balance(&db, 150_000).await;
        let repo = db.payouts();

        let p = payout(&aff, 150_000);
        assert!(repo.insert_if_exact_balance(&p).await.unwrap());
        assert!(repo.approve_if_covered(&p.id).await.unwrap());
        // Already approved; the pending guard misses now.
        assert!(!repo.approve_if_covered(&p.id).await.unwrap());

        let mut tx = db.pool().begin().await.unwrap();
        assert!(PayoutRepository::mark_paid(&mut tx, &p.id).await.unwrap());
        tx.commit().await.unwrap();

        // Paid is terminal.
        assert!(!repo.reject(&p.id).await.unwrap());
        let found = repo.get_required(&p.id).await.unwrap();
        assert_eq!(found.status, PayoutStatus::Paid);
    }

    #[tokio::test]
    async fn test_approve_fails_after_commission_voided() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let aff = setup_available_balance(&db, 150_000).await;
        let repo = db.payouts();

        let p = payout(&aff, 150_000);
        assert!(repo.insert_if_exact_balance(&p).await.unwrap());

        // The order behind the commission gets refunded before approval.
        let orders = db.commissions().list_for_affiliate(&aff).await.unwrap();
        let mut tx = db.pool().begin().await.unwrap();
        CommissionRepository::void_for_order(&mut tx, &orders[0].order_id)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert!(!repo.approve_if_covered(&p.id).await.unwrap());
    }
}
