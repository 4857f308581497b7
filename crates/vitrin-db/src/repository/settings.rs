//! # Settings Repository
//!
//! Process-wide configuration stored as a single row (`id = 1`). The
//! migration seeds defaults, so the row always exists.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use vitrin_core::Settings;

/// Repository for the settings singleton.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Loads the current settings.
    pub async fn get(&self) -> DbResult<Settings> {
        let settings = sqlx::query_as::<_, Settings>(
            r#"
            SELECT commission_level1_pct, commission_level2_pct,
                   flat_shipping_cents, min_payout_cents
            FROM settings
            WHERE id = 1
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(settings)
    }

    /// Replaces the settings. Callers holding a settings cache must
    /// invalidate it after this.
    pub async fn update(&self, settings: &Settings) -> DbResult<()> {
        debug!(
            l1 = settings.commission_level1_pct,
            l2 = settings.commission_level2_pct,
            "Updating settings"
        );

        sqlx::query(
            r#"
            UPDATE settings
            SET commission_level1_pct = ?1,
                commission_level2_pct = ?2,
                flat_shipping_cents = ?3,
                min_payout_cents = ?4,
                updated_at = ?5
            WHERE id = 1
            "#,
        )
        .bind(settings.commission_level1_pct)
        .bind(settings.commission_level2_pct)
        .bind(settings.flat_shipping_cents)
        .bind(settings.min_payout_cents)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
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

    #[tokio::test]
    async fn test_defaults_seeded_by_migration() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = db.settings().get().await.unwrap();

        assert_eq!(settings.commission_level1_pct, 5);
        assert_eq!(settings.commission_level2_pct, 2);
        assert_eq!(settings.min_payout_cents, 100_000);
    }

    #[tokio::test]
    async fn test_update_roundtrip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.settings();

        let mut settings = repo.get().await.unwrap();
        settings.commission_level1_pct = 10;
        settings.flat_shipping_cents = 5_000;
        repo.update(&settings).await.unwrap();

        let reloaded = repo.get().await.unwrap();
        assert_eq!(reloaded.commission_level1_pct, 10);
        assert_eq!(reloaded.flat_shipping_cents, 5_000);
    }
}
