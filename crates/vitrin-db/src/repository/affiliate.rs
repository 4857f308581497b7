//! # Affiliate Repository
//!
//! Persistence for affiliates and their referral tree. The tree is at most
//! two levels deep for commission purposes; only `parent_affiliate_id` is
//! stored and the engine resolves one hop at payment time.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use vitrin_core::Affiliate;

const AFFILIATE_COLUMNS: &str = r#"
    id, display_name, parent_affiliate_id, bank_iban, bank_holder,
    is_active, created_at
"#;

/// Repository for affiliates.
#[derive(Debug, Clone)]
pub struct AffiliateRepository {
    pool: SqlitePool,
}

impl AffiliateRepository {
    /// Creates a new AffiliateRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AffiliateRepository { pool }
    }

    /// Gets an affiliate by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Affiliate>> {
        let affiliate = sqlx::query_as::<_, Affiliate>(&format!(
            "SELECT {AFFILIATE_COLUMNS} FROM affiliates WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(affiliate)
    }

    /// Gets an affiliate by its ID, failing if absent.
    pub async fn get_required(&self, id: &str) -> DbResult<Affiliate> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Affiliate", id))
    }

    /// Inserts an affiliate.
    pub async fn insert(&self, affiliate: &Affiliate) -> DbResult<()> {
        debug!(affiliate_id = %affiliate.id, "Inserting affiliate");

        sqlx::query(
            r#"
            INSERT INTO affiliates (
                id, display_name, parent_affiliate_id, bank_iban, bank_holder,
                is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&affiliate.id)
        .bind(&affiliate.display_name)
        .bind(&affiliate.parent_affiliate_id)
        .bind(&affiliate.bank_iban)
        .bind(&affiliate.bank_holder)
        .bind(affiliate.is_active)
        .bind(affiliate.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records or replaces the bank account used for payouts.
    pub async fn set_bank_details(&self, id: &str, iban: &str, holder: &str) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE affiliates SET bank_iban = ?2, bank_holder = ?3 WHERE id = ?1")
                .bind(id)
                .bind(iban)
                .bind(holder)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Affiliate", id));
        }
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
    use chrono::Utc;

    #[tokio::test]
    async fn test_insert_get_and_bank_details() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.affiliates();

        let affiliate = Affiliate {
            id: "aff-1".into(),
            display_name: "Sara".into(),
            parent_affiliate_id: None,
            bank_iban: None,
            bank_holder: None,
            is_active: true,
            created_at: Utc::now(),
        };
        repo.insert(&affiliate).await.unwrap();

        let found = repo.get_required("aff-1").await.unwrap();
        assert!(!found.has_bank_details());

        repo.set_bank_details("aff-1", "IR820540102680020817909002", "Sara")
            .await
            .unwrap();
        let found = repo.get_required("aff-1").await.unwrap();
        assert!(found.has_bank_details());

        assert!(repo
            .set_bank_details("missing", "IR00", "Nobody")
            .await
            .is_err());
    }
}
