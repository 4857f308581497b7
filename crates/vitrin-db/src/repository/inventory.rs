//! # Inventory Ledger Repository
//!
//! Stock counter mutations and the append-only movement log.
//!
//! ## Compare-and-Guard Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Why Guarded Updates, Not Read-Then-Write                   │
//! │                                                                         │
//! │  ❌ WRONG: read available, check in Rust, then UPDATE                  │
//! │     Two concurrent checkouts both read available=1 and both reserve.   │
//! │                                                                         │
//! │  ✅ CORRECT: single conditional statement                               │
//! │     UPDATE variants SET stock_reserved = stock_reserved + ?            │
//! │     WHERE id = ? AND stock_on_hand - stock_reserved >= ?               │
//! │                                                                         │
//! │  The store evaluates the guard against the latest committed row at     │
//! │  write time. For the last unit, exactly one statement matches a row;   │
//! │  the loser sees rows_affected = 0 and reports OutOfStock.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every counter mutation writes exactly one `stock_movements` row on the
//! same connection, so callers composing these primitives inside a
//! transaction get counters and audit log committed or rolled back together.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use vitrin_core::{MovementReason, StockMovement, Variant};

/// Result of a guarded counter update.
///
/// Guard failures are data, not errors: the engine maps them to the right
/// domain error (`OutOfStock`, `StockGuardFailed`, `VariantNotFound`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedUpdate {
    /// Guard held; counters and movement row written.
    Applied,
    /// No such variant.
    NotFound,
    /// The variant exists but the guard predicate failed. Carries the
    /// counters observed after the failed attempt for error reporting.
    GuardFailed {
        stock_on_hand: i64,
        stock_reserved: i64,
    },
}

/// Repository for the inventory ledger.
///
/// Reads go through the pool; mutations are associated functions taking a
/// `&mut SqliteConnection` so the engine can run a whole basket (or a
/// transition's side effects) in one transaction.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a variant by its ID.
    pub async fn get_variant(&self, id: &str) -> DbResult<Option<Variant>> {
        let variant = sqlx::query_as::<_, Variant>(
            r#"
            SELECT id, product_id, sku, name, price_cents,
                   stock_on_hand, stock_reserved, is_active,
                   created_at, updated_at
            FROM variants
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(variant)
    }

    /// Gets a variant inside an open transaction.
    pub async fn get_variant_tx(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Variant>> {
        let variant = sqlx::query_as::<_, Variant>(
            r#"
            SELECT id, product_id, sku, name, price_cents,
                   stock_on_hand, stock_reserved, is_active,
                   created_at, updated_at
            FROM variants
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(variant)
    }

    /// All movements for a variant, oldest first.
    pub async fn movements_for_variant(&self, variant_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, variant_id, delta, reason, actor, created_at
            FROM stock_movements
            WHERE variant_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(variant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Reconciliation helper: sums the movement deltas that move
    /// `stock_on_hand` (commit-on-payment, refund-restock, manual-adjust,
    /// initial-stock). For a healthy ledger this equals the variant's
    /// current `stock_on_hand`, since variants start at zero.
    pub async fn on_hand_per_movements(&self, variant_id: &str) -> DbResult<i64> {
        let sum: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(delta)
            FROM stock_movements
            WHERE variant_id = ?1
              AND reason IN ('commit-on-payment', 'refund-restock',
                             'manual-adjust', 'initial-stock')
            "#,
        )
        .bind(variant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum.unwrap_or(0))
    }

    // =========================================================================
    // Catalog setup
    // =========================================================================

    /// Inserts a product (minimal catalog support for seeding and tests).
    pub async fn insert_product(&self, id: &str, name: &str) -> DbResult<()> {
        let now = Utc::now();
        sqlx::query("INSERT INTO products (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(id)
            .bind(name)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Inserts a variant. If `initial_stock > 0`, records the opening
    /// `initial-stock` movement in the same transaction so the audit
    /// invariant holds from day one.
    pub async fn insert_variant(&self, variant: &Variant) -> DbResult<()> {
        debug!(sku = %variant.sku, "Inserting variant");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO variants (
                id, product_id, sku, name, price_cents,
                stock_on_hand, stock_reserved, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(&variant.sku)
        .bind(&variant.name)
        .bind(variant.price_cents)
        .bind(variant.stock_on_hand)
        .bind(variant.stock_reserved)
        .bind(variant.is_active)
        .bind(variant.created_at)
        .bind(variant.updated_at)
        .execute(&mut *tx)
        .await?;

        if variant.stock_on_hand > 0 {
            insert_movement(
                &mut tx,
                &variant.id,
                variant.stock_on_hand,
                MovementReason::InitialStock,
                "setup",
            )
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Ledger mutations (transactional primitives)
    // =========================================================================

    /// Reserves `qty` units: `stock_reserved += qty` **only if**
    /// `stock_on_hand - stock_reserved >= qty`.
    pub async fn reserve(
        conn: &mut SqliteConnection,
        variant_id: &str,
        qty: i64,
        actor: &str,
    ) -> DbResult<GuardedUpdate> {
        debug!(variant_id = %variant_id, qty = %qty, "Reserving stock");

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE variants
            SET stock_reserved = stock_reserved + ?2, updated_at = ?3
            WHERE id = ?1 AND stock_on_hand - stock_reserved >= ?2
            "#,
        )
        .bind(variant_id)
        .bind(qty)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return guard_failure(conn, variant_id).await;
        }

        insert_movement(conn, variant_id, qty, MovementReason::Reserve, actor).await?;
        Ok(GuardedUpdate::Applied)
    }

    /// Releases `qty` reserved units: `stock_reserved -= qty`, guarded by
    /// `stock_reserved >= qty` (never goes negative).
    pub async fn release(
        conn: &mut SqliteConnection,
        variant_id: &str,
        qty: i64,
        actor: &str,
    ) -> DbResult<GuardedUpdate> {
        debug!(variant_id = %variant_id, qty = %qty, "Releasing reservation");

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE variants
            SET stock_reserved = stock_reserved - ?2, updated_at = ?3
            WHERE id = ?1 AND stock_reserved >= ?2
            "#,
        )
        .bind(variant_id)
        .bind(qty)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return guard_failure(conn, variant_id).await;
        }

        insert_movement(conn, variant_id, -qty, MovementReason::Release, actor).await?;
        Ok(GuardedUpdate::Applied)
    }

    /// Commits `qty` reserved units on payment success: decrements both
    /// counters, guarded by `stock_reserved >= qty`. Converts the
    /// reservation into a permanent deduction.
    pub async fn commit(
        conn: &mut SqliteConnection,
        variant_id: &str,
        qty: i64,
        actor: &str,
    ) -> DbResult<GuardedUpdate> {
        debug!(variant_id = %variant_id, qty = %qty, "Committing reservation");

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE variants
            SET stock_on_hand = stock_on_hand - ?2,
                stock_reserved = stock_reserved - ?2,
                updated_at = ?3
            WHERE id = ?1 AND stock_reserved >= ?2
            "#,
        )
        .bind(variant_id)
        .bind(qty)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return guard_failure(conn, variant_id).await;
        }

        insert_movement(conn, variant_id, -qty, MovementReason::CommitOnPayment, actor).await?;
        Ok(GuardedUpdate::Applied)
    }

    /// Returns `qty` previously committed units to on-hand after a
    /// post-payment cancellation/refund.
    pub async fn restock(
        conn: &mut SqliteConnection,
        variant_id: &str,
        qty: i64,
        actor: &str,
    ) -> DbResult<GuardedUpdate> {
        debug!(variant_id = %variant_id, qty = %qty, "Restocking");

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE variants
            SET stock_on_hand = stock_on_hand + ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(variant_id)
        .bind(qty)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(GuardedUpdate::NotFound);
        }

        insert_movement(conn, variant_id, qty, MovementReason::RefundRestock, actor).await?;
        Ok(GuardedUpdate::Applied)
    }

    /// Administrative correction of `stock_on_hand` by a signed delta,
    /// guarded so the result keeps `stock_on_hand >= stock_reserved` and
    /// `stock_on_hand >= 0`.
    pub async fn adjust(
        conn: &mut SqliteConnection,
        variant_id: &str,
        delta: i64,
        actor: &str,
    ) -> DbResult<GuardedUpdate> {
        debug!(variant_id = %variant_id, delta = %delta, "Adjusting stock");

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE variants
            SET stock_on_hand = stock_on_hand + ?2, updated_at = ?3
            WHERE id = ?1
              AND stock_on_hand + ?2 >= stock_reserved
              AND stock_on_hand + ?2 >= 0
            "#,
        )
        .bind(variant_id)
        .bind(delta)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return guard_failure(conn, variant_id).await;
        }

        insert_movement(conn, variant_id, delta, MovementReason::ManualAdjust, actor).await?;
        Ok(GuardedUpdate::Applied)
    }
}

/// Distinguishes "variant missing" from "guard predicate failed" after a
/// zero-row conditional update, reporting the current counters.
async fn guard_failure(conn: &mut SqliteConnection, variant_id: &str) -> DbResult<GuardedUpdate> {
    let row: Option<(i64, i64)> =
        sqlx::query_as("SELECT stock_on_hand, stock_reserved FROM variants WHERE id = ?1")
            .bind(variant_id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(match row {
        None => GuardedUpdate::NotFound,
        Some((stock_on_hand, stock_reserved)) => GuardedUpdate::GuardFailed {
            stock_on_hand,
            stock_reserved,
        },
    })
}

/// Appends one movement row. Same connection as the counter update, so the
/// caller's transaction covers both.
async fn insert_movement(
    conn: &mut SqliteConnection,
    variant_id: &str,
    delta: i64,
    reason: MovementReason,
    actor: &str,
) -> DbResult<()> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO stock_movements (id, variant_id, delta, reason, actor, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(id)
    .bind(variant_id)
    .bind(delta)
    .bind(reason)
    .bind(actor)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;

    async fn setup() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let inv = db.inventory();
        inv.insert_product("p-1", "T-Shirt").await.unwrap();

        let now = Utc::now();
        let variant = Variant {
            id: "v-1".into(),
            product_id: "p-1".into(),
            sku: "TS-BLUE-XL".into(),
            name: "Blue / XL".into(),
            price_cents: 50_000,
            stock_on_hand: 5,
            stock_reserved: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        inv.insert_variant(&variant).await.unwrap();
        (db, "v-1".to_string())
    }

    #[tokio::test]
    async fn test_reserve_within_available() {
        let (db, vid) = setup().await;

        let mut tx = db.pool().begin().await.unwrap();
        let outcome = InventoryRepository::reserve(&mut tx, &vid, 3, "test").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outcome, GuardedUpdate::Applied);
        let v = db.inventory().get_variant(&vid).await.unwrap().unwrap();
        assert_eq!(v.stock_on_hand, 5);
        assert_eq!(v.stock_reserved, 3);
    }

    #[tokio::test]
    async fn test_reserve_guard_fails_when_over_available() {
        let (db, vid) = setup().await;

        let mut tx = db.pool().begin().await.unwrap();
        let outcome = InventoryRepository::reserve(&mut tx, &vid, 6, "test").await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(
            outcome,
            GuardedUpdate::GuardFailed {
                stock_on_hand: 5,
                stock_reserved: 0
            }
        );
    }

    #[tokio::test]
    async fn test_reserve_unknown_variant() {
        let (db, _) = setup().await;

        let mut tx = db.pool().begin().await.unwrap();
        let outcome = InventoryRepository::reserve(&mut tx, "nope", 1, "test").await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(outcome, GuardedUpdate::NotFound);
    }

    #[tokio::test]
    async fn test_release_never_goes_negative() {
        let (db, vid) = setup().await;

        let mut tx = db.pool().begin().await.unwrap();
        InventoryRepository::reserve(&mut tx, &vid, 2, "test").await.unwrap();
        let over = InventoryRepository::release(&mut tx, &vid, 3, "test").await.unwrap();
        assert!(matches!(over, GuardedUpdate::GuardFailed { .. }));

        let ok = InventoryRepository::release(&mut tx, &vid, 2, "test").await.unwrap();
        assert_eq!(ok, GuardedUpdate::Applied);
        tx.commit().await.unwrap();

        let v = db.inventory().get_variant(&vid).await.unwrap().unwrap();
        assert_eq!(v.stock_reserved, 0);
        assert_eq!(v.stock_on_hand, 5);
    }

    #[tokio::test]
    async fn test_commit_converts_reservation() {
        let (db, vid) = setup().await;

        let mut tx = db.pool().begin().await.unwrap();
        InventoryRepository::reserve(&mut tx, &vid, 3, "test").await.unwrap();
        let outcome = InventoryRepository::commit(&mut tx, &vid, 3, "test").await.unwrap();
        assert_eq!(outcome, GuardedUpdate::Applied);
        tx.commit().await.unwrap();

        let v = db.inventory().get_variant(&vid).await.unwrap().unwrap();
        assert_eq!(v.stock_on_hand, 2);
        assert_eq!(v.stock_reserved, 0);
    }

    #[tokio::test]
    async fn test_commit_requires_reservation() {
        let (db, vid) = setup().await;

        let mut tx = db.pool().begin().await.unwrap();
        let outcome = InventoryRepository::commit(&mut tx, &vid, 1, "test").await.unwrap();
        tx.rollback().await.unwrap();

        assert!(matches!(outcome, GuardedUpdate::GuardFailed { .. }));
    }

    #[tokio::test]
    async fn test_adjust_guards() {
        let (db, vid) = setup().await;

        // Reserve 4 of 5; adjusting below the reservation must fail.
        let mut tx = db.pool().begin().await.unwrap();
        InventoryRepository::reserve(&mut tx, &vid, 4, "test").await.unwrap();
        let bad = InventoryRepository::adjust(&mut tx, &vid, -2, "admin").await.unwrap();
        assert!(matches!(bad, GuardedUpdate::GuardFailed { .. }));

        let ok = InventoryRepository::adjust(&mut tx, &vid, -1, "admin").await.unwrap();
        assert_eq!(ok, GuardedUpdate::Applied);
        tx.commit().await.unwrap();

        let v = db.inventory().get_variant(&vid).await.unwrap().unwrap();
        assert_eq!(v.stock_on_hand, 4);
        assert_eq!(v.stock_reserved, 4);
    }

    #[tokio::test]
    async fn test_movement_log_matches_on_hand() {
        let (db, vid) = setup().await;

        let mut tx = db.pool().begin().await.unwrap();
        InventoryRepository::reserve(&mut tx, &vid, 3, "checkout").await.unwrap();
        InventoryRepository::commit(&mut tx, &vid, 3, "payment-callback").await.unwrap();
        InventoryRepository::restock(&mut tx, &vid, 1, "admin").await.unwrap();
        tx.commit().await.unwrap();

        let inv = db.inventory();
        let v = inv.get_variant(&vid).await.unwrap().unwrap();
        // 5 initial - 3 committed + 1 restocked
        assert_eq!(v.stock_on_hand, 3);

        // Audit invariant: on-hand-affecting deltas sum to current on-hand.
        let audited = inv.on_hand_per_movements(&vid).await.unwrap();
        assert_eq!(audited, v.stock_on_hand);

        // Four movements total: initial, reserve, commit, restock.
        let movements = inv.movements_for_variant(&vid).await.unwrap();
        assert_eq!(movements.len(), 4);
        assert_eq!(movements[0].reason, MovementReason::InitialStock);
    }
}
