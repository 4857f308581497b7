//! # Commission Engine
//!
//! Records two-level affiliate commissions for paid orders.
//!
//! ## Idempotency
//! The existence check runs inside the same transaction as the inserts, so
//! concurrent retries of the payment callback cannot both create rows. The
//! `UNIQUE(order_id, level)` constraint is the backstop for the window the
//! check cannot see.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use vitrin_core::commission::plan_for_order;
use vitrin_core::{Commission, CommissionStatus, CoreError};
use vitrin_db::{CommissionRepository, Database, DbError};

use crate::error::EngineResult;
use crate::settings::SettingsCache;

/// Creates commission rows and answers balance queries.
pub struct CommissionEngine {
    db: Database,
    settings: Arc<SettingsCache>,
}

impl CommissionEngine {
    pub fn new(db: Database, settings: Arc<SettingsCache>) -> Self {
        CommissionEngine { db, settings }
    }

    /// Records the commissions for a paid order.
    ///
    /// No-op when rows already exist for this order or the order has no
    /// referring affiliate. Level 1 goes to the referrer, level 2 to the
    /// referrer's parent (if any), both `pending` at
    /// `floor(total × pct / 100)`.
    pub async fn create_for_order(&self, order_id: &str) -> EngineResult<Vec<Commission>> {
        let order = self
            .db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        let Some(ref_affiliate_id) = order.ref_affiliate_id.as_deref() else {
            debug!(order_id = %order_id, "No referrer, no commissions");
            return Ok(Vec::new());
        };

        let affiliate = self
            .db
            .affiliates()
            .get_by_id(ref_affiliate_id)
            .await?
            .ok_or_else(|| CoreError::AffiliateNotFound(ref_affiliate_id.to_string()))?;

        let settings = self.settings.get().await?;
        let plans = plan_for_order(
            order.total(),
            Some(&affiliate.id),
            affiliate.parent_affiliate_id.as_deref(),
            &settings,
        );

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        if CommissionRepository::exists_for_order(&mut tx, order_id).await? {
            debug!(order_id = %order_id, "Commissions already recorded");
            drop(tx);
            return Ok(self.db.commissions().list_for_order(order_id).await?);
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(plans.len());
        for plan in plans {
            let commission = Commission {
                id: Uuid::new_v4().to_string(),
                affiliate_id: plan.affiliate_id,
                order_id: order_id.to_string(),
                level: plan.level,
                percentage: plan.percentage,
                amount_cents: plan.amount.cents(),
                status: CommissionStatus::Pending,
                created_at: now,
                updated_at: now,
            };
            CommissionRepository::insert(&mut tx, &commission).await?;
            created.push(commission);
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(
            order_id = %order_id,
            rows = created.len(),
            "Commissions recorded"
        );
        Ok(created)
    }

    /// An affiliate's commissions, newest first.
    pub async fn list_for_affiliate(&self, affiliate_id: &str) -> EngineResult<Vec<Commission>> {
        Ok(self.db.commissions().list_for_affiliate(affiliate_id).await?)
    }
}
