//! # Payment Service
//!
//! Opens payment sessions and handles the gateway callback.
//!
//! ## Idempotent Verification
//! The callback may arrive more than once (back button, gateway retry,
//! double webhook). `verify` classifies the order exactly once at the top
//! and dispatches on that classification:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       verify(order, token, flag)                        │
//! │                                                                         │
//! │  stored token != supplied token ──────────► AuthorityMismatch          │
//! │                                                                         │
//! │  classify order status once:                                            │
//! │    pending                      → NotYetProcessed                      │
//! │    processing/shipped/          → AlreadySucceeded  ── replay, no      │
//! │      delivered/returned                                side effects    │
//! │    canceled/refunded            → AlreadyFailed     ── replay          │
//! │                                                                         │
//! │  NotYetProcessed + user-cancel  → release + cancel                     │
//! │  NotYetProcessed + success      → gateway verify                       │
//! │      declined   → release + cancel                                     │
//! │      transport  → error, order stays pending (retry later)             │
//! │      verified   → ONE TRANSACTION: commit stock, pending→processing,   │
//! │                   settlement ref. Commissions AFTER commit, guarded    │
//! │                   by their own idempotency check.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use vitrin_core::{CoreError, Order, OrderStatus};
use vitrin_db::{Database, DbError, GuardedUpdate, InventoryRepository, OrderRepository};

use crate::commission::CommissionEngine;
use crate::error::EngineResult;
use crate::gateway::{GatewayError, PaymentGateway, Session, SessionRequest};

/// Actor recorded on callback-driven stock movements.
const CALLBACK_ACTOR: &str = "payment-callback";

/// What the gateway callback reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackFlag {
    /// The customer completed payment; verify with the gateway.
    Success,
    /// The customer backed out at the gateway.
    Canceled,
}

/// Result of handling a callback.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub order_id: String,
    pub status: OrderStatus,
    pub settlement_ref: Option<String>,
    /// True when this call performed the state change; false when it
    /// replayed an outcome already reached by an earlier callback.
    pub newly_processed: bool,
}

/// One-shot classification of the order at the top of `verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
    NotYetProcessed,
    AlreadySucceeded,
    AlreadyFailed,
}

fn classify(status: OrderStatus) -> Classification {
    match status {
        OrderStatus::Pending => Classification::NotYetProcessed,
        OrderStatus::Canceled | OrderStatus::Refunded => Classification::AlreadyFailed,
        OrderStatus::Processing
        | OrderStatus::Shipped
        | OrderStatus::Delivered
        | OrderStatus::Returned => Classification::AlreadySucceeded,
    }
}

/// Payment session and callback handling.
pub struct PaymentService {
    db: Database,
    gateway: Arc<dyn PaymentGateway>,
    commissions: Arc<CommissionEngine>,
    callback_url: String,
}

impl PaymentService {
    pub fn new(
        db: Database,
        gateway: Arc<dyn PaymentGateway>,
        commissions: Arc<CommissionEngine>,
        callback_url: impl Into<String>,
    ) -> Self {
        PaymentService {
            db,
            gateway,
            commissions,
            callback_url: callback_url.into(),
        }
    }

    /// Opens a payment session for a pending order.
    ///
    /// Idempotent per order: if a session token is already stored, its
    /// redirect URL is returned without contacting the gateway again.
    pub async fn request_session(&self, order_id: &str) -> EngineResult<Session> {
        let order = self.load_order(order_id).await?;

        if order.status != OrderStatus::Pending {
            return Err(CoreError::InvalidTransition {
                order_id: order_id.to_string(),
                from: order.status,
                to: OrderStatus::Processing,
            }
            .into());
        }

        if let Some(token) = order.authority_token {
            return Ok(Session {
                redirect_url: self.gateway.redirect_url(&token),
                authority_token: token,
            });
        }

        let session = self
            .gateway
            .request_session(&SessionRequest {
                order_id: order_id.to_string(),
                amount_cents: order.total_cents,
                description: format!("Order {order_id}"),
                callback_url: self.callback_url.clone(),
            })
            .await?;

        if !self
            .db
            .orders()
            .set_authority_token(order_id, &session.authority_token)
            .await?
        {
            // A concurrent session request stored its token first; reuse it.
            let order = self.load_order(order_id).await?;
            let token = order
                .authority_token
                .ok_or_else(|| CoreError::AuthorityMismatch {
                    order_id: order_id.to_string(),
                })?;
            return Ok(Session {
                redirect_url: self.gateway.redirect_url(&token),
                authority_token: token,
            });
        }

        info!(order_id = %order_id, "Payment session opened");
        Ok(session)
    }

    /// Handles the gateway callback. Safe to call any number of times with
    /// the same payload; financial side effects run at most once.
    pub async fn verify(
        &self,
        order_id: &str,
        authority_token: &str,
        flag: CallbackFlag,
    ) -> EngineResult<VerifyOutcome> {
        let order = self.load_order(order_id).await?;

        // Untrusted input: the callback token must match the stored one
        // before anything else happens.
        if order.authority_token.as_deref() != Some(authority_token) {
            warn!(order_id = %order_id, "Callback with mismatched authority token");
            return Err(CoreError::AuthorityMismatch {
                order_id: order_id.to_string(),
            }
            .into());
        }

        let classification = classify(order.status);

        match (flag, classification) {
            // Replays: report the known outcome, touch nothing.
            (_, Classification::AlreadySucceeded) | (_, Classification::AlreadyFailed) => {
                Ok(Self::replay(&order))
            }

            (CallbackFlag::Canceled, Classification::NotYetProcessed) => {
                let canceled = self.cancel_pending(&order).await?;
                if canceled {
                    info!(order_id = %order_id, "Order canceled by customer at gateway");
                    Ok(VerifyOutcome {
                        order_id: order_id.to_string(),
                        status: OrderStatus::Canceled,
                        settlement_ref: None,
                        newly_processed: true,
                    })
                } else {
                    // Raced with another callback; report what it did.
                    Ok(Self::replay(&self.load_order(order_id).await?))
                }
            }

            (CallbackFlag::Success, Classification::NotYetProcessed) => {
                match self.gateway.verify(authority_token, order.total_cents).await {
                    Ok(settlement) => {
                        self.settle(&order, &settlement.settlement_ref).await
                    }
                    Err(GatewayError::Declined { code }) => {
                        warn!(order_id = %order_id, code, "Gateway declined payment");
                        if self.cancel_pending(&order).await? {
                            Ok(VerifyOutcome {
                                order_id: order_id.to_string(),
                                status: OrderStatus::Canceled,
                                settlement_ref: None,
                                newly_processed: true,
                            })
                        } else {
                            Ok(Self::replay(&self.load_order(order_id).await?))
                        }
                    }
                    // Ambiguous failure: leave the order pending and let a
                    // later callback retry the idempotent verify.
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    /// Commits the reservation, advances to `processing` and records the
    /// settlement reference, all in one transaction. Commissions are
    /// created only after that transaction commits.
    async fn settle(&self, order: &Order, settlement_ref: &str) -> EngineResult<VerifyOutcome> {
        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        let items = OrderRepository::items_for_order_tx(&mut tx, &order.id).await?;
        for item in &items {
            let outcome =
                InventoryRepository::commit(&mut tx, &item.variant_id, item.quantity, CALLBACK_ACTOR)
                    .await?;
            if outcome != GuardedUpdate::Applied {
                // A reservation was reversed under us. Abort the commit,
                // then unwind the order instead of leaving it pending.
                warn!(
                    order_id = %order.id,
                    variant_id = %item.variant_id,
                    ?outcome,
                    "Stock commit failed during settlement"
                );
                drop(tx);
                self.cancel_pending(order).await?;
                return Err(CoreError::StockGuardFailed {
                    variant_id: item.variant_id.clone(),
                    detail: "reservation missing at settlement".to_string(),
                }
                .into());
            }
        }

        if !OrderRepository::update_status(
            &mut tx,
            &order.id,
            OrderStatus::Pending,
            OrderStatus::Processing,
        )
        .await?
        {
            // Another callback settled or canceled first; replay its result.
            drop(tx);
            return Ok(Self::replay(&self.load_order(&order.id).await?));
        }

        OrderRepository::set_settlement_ref(&mut tx, &order.id, settlement_ref).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            order_id = %order.id,
            settlement_ref,
            "Payment settled, stock committed"
        );

        // First successful verification creates the commissions; the
        // engine's own idempotency check makes duplicate callbacks no-ops.
        self.commissions.create_for_order(&order.id).await?;

        Ok(VerifyOutcome {
            order_id: order.id.clone(),
            status: OrderStatus::Processing,
            settlement_ref: Some(settlement_ref.to_string()),
            newly_processed: true,
        })
    }

    /// Releases the order's reservations and cancels it, in one
    /// transaction. Returns false when another callback moved the order
    /// out of `pending` first.
    async fn cancel_pending(&self, order: &Order) -> EngineResult<bool> {
        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        if !OrderRepository::update_status(
            &mut tx,
            &order.id,
            OrderStatus::Pending,
            OrderStatus::Canceled,
        )
        .await?
        {
            drop(tx);
            return Ok(false);
        }

        let items = OrderRepository::items_for_order_tx(&mut tx, &order.id).await?;
        for item in &items {
            let outcome = InventoryRepository::release(
                &mut tx,
                &item.variant_id,
                item.quantity,
                CALLBACK_ACTOR,
            )
            .await?;
            if outcome != GuardedUpdate::Applied {
                // The reservation is already gone (externally reversed);
                // the cancel itself must still go through.
                warn!(
                    order_id = %order.id,
                    variant_id = %item.variant_id,
                    ?outcome,
                    "Reservation already released during cancel"
                );
            }
        }

        tx.commit().await.map_err(DbError::from)?;
        Ok(true)
    }

    fn replay(order: &Order) -> VerifyOutcome {
        VerifyOutcome {
            order_id: order.id.clone(),
            status: order.status,
            settlement_ref: order.settlement_ref.clone(),
            newly_processed: false,
        }
    }

    async fn load_order(&self, order_id: &str) -> EngineResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
    }
}
