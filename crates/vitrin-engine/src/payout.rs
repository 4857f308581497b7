//! # Payout Service
//!
//! Affiliate payout requests reconciled against the commission ledger.
//!
//! ## Exact-Balance Semantics
//! A request must equal the affiliate's full unreserved available balance;
//! partial withdrawals are rejected by design. Settlement consumes
//! `available` commissions oldest-first and must land exactly on the payout
//! amount, or nothing is mutated.
//!
//! The aggregate balance checks are embedded in single guarded statements
//! (see `vitrin_db::PayoutRepository`), so concurrent requests against one
//! balance serialize on the store's writer and at most one succeeds.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use vitrin_core::validation::validate_payout_amount;
use vitrin_core::{CoreError, PayoutRequest, PayoutStatus};
use vitrin_db::{CommissionRepository, Database, DbError, PayoutRepository};

use crate::error::EngineResult;
use crate::settings::SettingsCache;

/// Payout request lifecycle and FIFO settlement.
pub struct PayoutService {
    db: Database,
    settings: Arc<SettingsCache>,
}

impl PayoutService {
    pub fn new(db: Database, settings: Arc<SettingsCache>) -> Self {
        PayoutService { db, settings }
    }

    /// The affiliate's unreserved available balance: available commissions
    /// minus amounts locked by pending/approved requests.
    pub async fn available_to_request(&self, affiliate_id: &str) -> EngineResult<i64> {
        let available = self.db.commissions().available_balance(affiliate_id).await?;
        let reserved = self.db.payouts().reserved_amount(affiliate_id).await?;
        Ok(available - reserved)
    }

    /// Creates a payout request for exactly the affiliate's available
    /// balance.
    ///
    /// Preconditions checked before the store is touched: positive amount,
    /// bank details on file, amount at or above the configured minimum.
    /// The exact-balance check itself is the guarded insert.
    pub async fn request_payout(
        &self,
        affiliate_id: &str,
        amount_cents: i64,
    ) -> EngineResult<PayoutRequest> {
        validate_payout_amount(amount_cents)?;

        let affiliate = self
            .db
            .affiliates()
            .get_by_id(affiliate_id)
            .await?
            .ok_or_else(|| CoreError::AffiliateNotFound(affiliate_id.to_string()))?;

        if !affiliate.has_bank_details() {
            return Err(CoreError::MissingBankDetails {
                affiliate_id: affiliate_id.to_string(),
            }
            .into());
        }

        let settings = self.settings.get().await?;
        if amount_cents < settings.min_payout_cents {
            return Err(CoreError::BelowMinimumPayout {
                requested: amount_cents,
                minimum: settings.min_payout_cents,
            }
            .into());
        }

        let now = Utc::now();
        let payout = PayoutRequest {
            id: Uuid::new_v4().to_string(),
            affiliate_id: affiliate_id.to_string(),
            amount_cents,
            status: PayoutStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        if !self.db.payouts().insert_if_exact_balance(&payout).await? {
            let available = self.available_to_request(affiliate_id).await?;
            warn!(
                affiliate_id = %affiliate_id,
                requested = amount_cents,
                available,
                "Payout request rejected: amount must equal available balance"
            );
            return Err(CoreError::InsufficientBalance {
                requested: amount_cents,
                available,
            }
            .into());
        }

        info!(
            affiliate_id = %affiliate_id,
            payout_id = %payout.id,
            amount = amount_cents,
            "Payout requested"
        );
        Ok(payout)
    }

    /// Approves a pending request, re-checking that the balance still
    /// covers it (commissions may have been voided since the request).
    pub async fn approve(&self, payout_id: &str) -> EngineResult<PayoutRequest> {
        let payout = self.load(payout_id).await?;
        if payout.status != PayoutStatus::Pending {
            return Err(CoreError::InvalidPayoutStatus {
                payout_id: payout_id.to_string(),
                status: payout.status,
            }
            .into());
        }

        if !self.db.payouts().approve_if_covered(payout_id).await? {
            let current = self.load(payout_id).await?;
            if current.status != PayoutStatus::Pending {
                return Err(CoreError::InvalidPayoutStatus {
                    payout_id: payout_id.to_string(),
                    status: current.status,
                }
                .into());
            }
            // Still pending: the balance no longer covers the amount.
            let available = self
                .db
                .commissions()
                .available_balance(&current.affiliate_id)
                .await?;
            return Err(CoreError::InsufficientBalance {
                requested: current.amount_cents,
                available,
            }
            .into());
        }

        info!(payout_id = %payout_id, "Payout approved");
        self.load(payout_id).await
    }

    /// Settles an approved request: marks it `paid` and consumes the
    /// affiliate's `available` commissions oldest-first until their sum
    /// equals the amount exactly. A granularity mismatch aborts the whole
    /// transaction with `BalanceMismatch`.
    pub async fn mark_paid(&self, payout_id: &str) -> EngineResult<PayoutRequest> {
        let payout = self.load(payout_id).await?;
        if payout.status != PayoutStatus::Approved {
            return Err(CoreError::InvalidPayoutStatus {
                payout_id: payout_id.to_string(),
                status: payout.status,
            }
            .into());
        }

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        if !PayoutRepository::mark_paid(&mut tx, payout_id).await? {
            drop(tx);
            let current = self.load(payout_id).await?;
            return Err(CoreError::InvalidPayoutStatus {
                payout_id: payout_id.to_string(),
                status: current.status,
            }
            .into());
        }

        let fifo = CommissionRepository::available_fifo(&mut tx, &payout.affiliate_id).await?;
        let mut consumed: i64 = 0;
        let mut consumed_rows: usize = 0;

        for commission in &fifo {
            if consumed == payout.amount_cents {
                break;
            }
            if consumed + commission.amount_cents > payout.amount_cents {
                // FIFO cannot land exactly on the amount; abort everything.
                break;
            }
            if !CommissionRepository::mark_paid(&mut tx, &commission.id).await? {
                // Consumed by a competing payout mid-flight; abort.
                warn!(
                    payout_id = %payout_id,
                    commission_id = %commission.id,
                    "Commission no longer available during settlement"
                );
                drop(tx);
                return Err(CoreError::InvalidCommissionStatus {
                    commission_id: commission.id.clone(),
                    status: commission.status,
                }
                .into());
            }
            consumed += commission.amount_cents;
            consumed_rows += 1;
        }

        if consumed != payout.amount_cents {
            warn!(
                payout_id = %payout_id,
                consumed,
                expected = payout.amount_cents,
                "FIFO consumption cannot match payout amount"
            );
            drop(tx);
            return Err(CoreError::BalanceMismatch {
                payout_id: payout_id.to_string(),
                consumed,
                expected: payout.amount_cents,
            }
            .into());
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(
            payout_id = %payout_id,
            amount = payout.amount_cents,
            commissions = consumed_rows,
            "Payout settled"
        );
        self.load(payout_id).await
    }

    /// Rejects a pending or approved request, releasing its balance
    /// reservation. Never legal from `paid`.
    pub async fn reject(&self, payout_id: &str) -> EngineResult<PayoutRequest> {
        if !self.db.payouts().reject(payout_id).await? {
            let current = self.load(payout_id).await?;
            return Err(CoreError::InvalidPayoutStatus {
                payout_id: payout_id.to_string(),
                status: current.status,
            }
            .into());
        }

        info!(payout_id = %payout_id, "Payout rejected");
        self.load(payout_id).await
    }

    async fn load(&self, payout_id: &str) -> EngineResult<PayoutRequest> {
        self.db
            .payouts()
            .get_by_id(payout_id)
            .await?
            .ok_or_else(|| CoreError::PayoutNotFound(payout_id.to_string()).into())
    }
}
