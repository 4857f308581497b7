//! # Order Service
//!
//! Applies order status transitions with their bound side effects.
//!
//! The pure transition table lives in `vitrin_core::states`; this service
//! executes an edge inside one transaction:
//!
//! ```text
//! BEGIN
//!   UPDATE orders SET status = to WHERE id = ? AND status = from   (CAS)
//!   stock effect      release / restock each line, guarded
//!   commission effect make-available / void for the order
//! COMMIT
//! ```
//!
//! Any ledger guard failure aborts the transaction and the status stays
//! untouched.

use tracing::{info, warn};

use vitrin_core::states::{
    commission_effect, stock_effect, validate_transition, CommissionEffect, StockEffect,
};
use vitrin_core::{CoreError, Order, OrderStatus};
use vitrin_db::{
    CommissionRepository, Database, DbError, GuardedUpdate, InventoryRepository, OrderRepository,
};

use crate::error::EngineResult;

/// Actor recorded on transition-driven stock movements.
const TRANSITION_ACTOR: &str = "order-transition";

/// Drives the order lifecycle.
pub struct OrderService {
    db: Database,
}

impl OrderService {
    pub fn new(db: Database) -> Self {
        OrderService { db }
    }

    /// Gets an order by id.
    pub async fn get(&self, order_id: &str) -> EngineResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
    }

    /// Moves an order to `to`, executing the edge's side effects in the
    /// same transaction. A self-transition is a no-op success returning the
    /// unchanged order.
    pub async fn transition(&self, order_id: &str, to: OrderStatus) -> EngineResult<Order> {
        let order = self.get(order_id).await?;
        let from = order.status;

        if !validate_transition(order_id, from, to)? {
            return Ok(order);
        }

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        if !OrderRepository::update_status(&mut tx, order_id, from, to).await? {
            // A concurrent transition won the CAS. Re-read and re-judge the
            // request against the fresh status.
            drop(tx);
            let current = self.get(order_id).await?;
            return if current.status == to {
                Ok(current)
            } else {
                Err(CoreError::InvalidTransition {
                    order_id: order_id.to_string(),
                    from: current.status,
                    to,
                }
                .into())
            };
        }

        match stock_effect(from, to) {
            StockEffect::None => {}
            StockEffect::Release => {
                let items = OrderRepository::items_for_order_tx(&mut tx, order_id).await?;
                for item in &items {
                    Self::apply_ledger(
                        InventoryRepository::release(
                            &mut tx,
                            &item.variant_id,
                            item.quantity,
                            TRANSITION_ACTOR,
                        )
                        .await?,
                        &item.variant_id,
                        "release",
                    )?;
                }
            }
            StockEffect::Restock => {
                let items = OrderRepository::items_for_order_tx(&mut tx, order_id).await?;
                for item in &items {
                    Self::apply_ledger(
                        InventoryRepository::restock(
                            &mut tx,
                            &item.variant_id,
                            item.quantity,
                            TRANSITION_ACTOR,
                        )
                        .await?,
                        &item.variant_id,
                        "restock",
                    )?;
                }
            }
        }

        match commission_effect(to) {
            CommissionEffect::None => {}
            CommissionEffect::MakeAvailable => {
                let moved = CommissionRepository::make_available_for_order(&mut tx, order_id).await?;
                if moved > 0 {
                    info!(order_id = %order_id, rows = moved, "Commissions now available");
                }
            }
            CommissionEffect::Void => {
                let voided = CommissionRepository::void_for_order(&mut tx, order_id).await?;
                if voided > 0 {
                    info!(order_id = %order_id, rows = voided, "Commissions voided");
                }
            }
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(order_id = %order_id, ?from, ?to, "Order transitioned");
        self.get(order_id).await
    }

    fn apply_ledger(
        outcome: GuardedUpdate,
        variant_id: &str,
        operation: &str,
    ) -> Result<(), CoreError> {
        match outcome {
            GuardedUpdate::Applied => Ok(()),
            GuardedUpdate::NotFound => Err(CoreError::VariantNotFound(variant_id.to_string())),
            GuardedUpdate::GuardFailed {
                stock_on_hand,
                stock_reserved,
            } => {
                warn!(
                    variant_id = %variant_id,
                    operation,
                    stock_on_hand,
                    stock_reserved,
                    "Ledger guard failed during transition"
                );
                Err(CoreError::StockGuardFailed {
                    variant_id: variant_id.to_string(),
                    detail: format!(
                        "{operation} rejected with on_hand={stock_on_hand}, reserved={stock_reserved}"
                    ),
                })
            }
        }
    }
}
