//! # Checkout Service
//!
//! Turns a validated basket into a `pending` order with its stock reserved.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One Checkout = One Transaction                       │
//! │                                                                         │
//! │  validate basket (no store access)                                      │
//! │  BEGIN                                                                  │
//! │    for each item:  guarded reserve  ── guard fails ──► ROLLBACK        │
//! │                                          (no partial reservation)      │
//! │    INSERT order (pending) + items (price snapshot)                     │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Reservations precede the order row inside the transaction, so a       │
//! │  reader never observes an order with under-reserved stock.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use vitrin_core::validation::{validate_checkout, BasketItem};
use vitrin_core::{CoreError, Money, Order, OrderItem, OrderStatus};
use vitrin_db::{Database, GuardedUpdate, InventoryRepository, OrderRepository};

use crate::error::EngineResult;
use crate::settings::SettingsCache;

/// Actor recorded on checkout stock movements.
const CHECKOUT_ACTOR: &str = "checkout";

/// A checkout request from the storefront.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub items: Vec<BasketItem>,
    pub shipping_address: String,
    /// Affiliate referral captured from the storefront session, if any.
    pub ref_affiliate_id: Option<String>,
}

/// Creates orders with all-or-nothing basket reservation.
pub struct CheckoutService {
    db: Database,
    settings: Arc<SettingsCache>,
}

impl CheckoutService {
    pub fn new(db: Database, settings: Arc<SettingsCache>) -> Self {
        CheckoutService { db, settings }
    }

    /// Reserves every basket line and creates the order in `pending`.
    ///
    /// Per-line failures abort the whole transaction: either every unit is
    /// reserved and the order exists, or nothing changed. The failing line
    /// is reported (`OutOfStock` carries variant, available and requested).
    pub async fn checkout(&self, request: &CheckoutRequest) -> EngineResult<Order> {
        validate_checkout(&request.customer_id, &request.items)?;

        let settings = self.settings.get().await?;
        let now = Utc::now();
        let order_id = Uuid::new_v4().to_string();

        let mut tx = self.db.pool().begin().await.map_err(vitrin_db::DbError::from)?;

        let mut subtotal = Money::zero();
        let mut order_items = Vec::with_capacity(request.items.len());

        for line in &request.items {
            let variant = InventoryRepository::get_variant_tx(&mut tx, &line.variant_id)
                .await?
                .filter(|v| v.is_active)
                .ok_or_else(|| CoreError::VariantNotFound(line.variant_id.clone()))?;

            match InventoryRepository::reserve(&mut tx, &variant.id, line.quantity, CHECKOUT_ACTOR)
                .await?
            {
                GuardedUpdate::Applied => {}
                GuardedUpdate::NotFound => {
                    return Err(CoreError::VariantNotFound(line.variant_id.clone()).into());
                }
                GuardedUpdate::GuardFailed {
                    stock_on_hand,
                    stock_reserved,
                } => {
                    warn!(
                        variant_id = %variant.id,
                        requested = line.quantity,
                        available = stock_on_hand - stock_reserved,
                        "Checkout rejected: insufficient stock"
                    );
                    // Dropping `tx` rolls back the earlier reservations.
                    return Err(CoreError::OutOfStock {
                        variant_id: variant.id,
                        available: stock_on_hand - stock_reserved,
                        requested: line.quantity,
                    }
                    .into());
                }
            }

            let line_total = variant.price().multiply_quantity(line.quantity);
            subtotal += line_total;

            order_items.push(OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.clone(),
                product_id: variant.product_id,
                variant_id: variant.id,
                quantity: line.quantity,
                unit_price_cents: variant.price_cents,
                line_total_cents: line_total.cents(),
                created_at: now,
            });
        }

        let shipping = Money::from_cents(settings.flat_shipping_cents);
        let order = Order {
            id: order_id,
            customer_id: request.customer_id.clone(),
            status: OrderStatus::Pending,
            subtotal_cents: subtotal.cents(),
            shipping_cents: shipping.cents(),
            total_cents: (subtotal + shipping).cents(),
            ref_affiliate_id: request.ref_affiliate_id.clone(),
            authority_token: None,
            settlement_ref: None,
            shipping_address: request.shipping_address.clone(),
            created_at: now,
            updated_at: now,
        };

        OrderRepository::insert(&mut tx, &order).await?;
        for item in &order_items {
            OrderRepository::insert_item(&mut tx, item).await?;
        }

        tx.commit().await.map_err(vitrin_db::DbError::from)?;

        info!(
            order_id = %order.id,
            customer_id = %order.customer_id,
            total = order.total_cents,
            lines = order_items.len(),
            "Order created"
        );
        Ok(order)
    }
}
