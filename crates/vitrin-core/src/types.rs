//! # Domain Types
//!
//! Core domain types used throughout Vitrin.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Variant      │   │      Order      │   │   Commission    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  order_id (FK)  │       │
//! │  │  stock_on_hand  │   │  status         │   │  level (1|2)    │       │
//! │  │  stock_reserved │   │  total_cents    │   │  amount_cents   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  StockMovement  │   │  PayoutRequest  │   │    Affiliate    │       │
//! │  │  append-only    │   │  pending→paid   │   │  two-level tree │       │
//! │  │  audit log      │   │  lifecycle      │   │  bank details   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where applicable (sku) - human-readable, potentially mutable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Variant (inventory counters)
// =============================================================================

/// A sellable variant of a product, carrying the stock counters owned by the
/// inventory ledger.
///
/// ## Invariant
/// `0 <= stock_reserved <= stock_on_hand` at all times. The ledger enforces
/// this with guarded conditional updates; nothing else may write these
/// columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Variant {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Product this variant belongs to.
    pub product_id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name (e.g., "Blue / XL").
    pub name: String,

    /// Price in minor currency units.
    pub price_cents: i64,

    /// Physical units owned.
    pub stock_on_hand: i64,

    /// Units provisionally held by unpaid orders.
    pub stock_reserved: i64,

    /// Whether the variant is sellable (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Variant {
    /// Units that can still be sold: on hand minus reserved.
    #[inline]
    pub fn available_to_sell(&self) -> i64 {
        self.stock_on_hand - self.stock_reserved
    }

    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Stock Movement (audit log)
// =============================================================================

/// Why a stock counter changed. Closed set; reasons are stored verbatim in
/// the movement log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "kebab-case"))]
#[serde(rename_all = "kebab-case")]
pub enum MovementReason {
    /// Checkout placed a provisional hold (`stock_reserved` += qty).
    Reserve,
    /// A pending order was canceled or failed payment (`stock_reserved` -= qty).
    Release,
    /// Payment verified; reservation became a permanent deduction.
    CommitOnPayment,
    /// A committed order was canceled/refunded/returned; units returned.
    RefundRestock,
    /// Administrative correction.
    ManualAdjust,
    /// Stock recorded when the variant was first set up.
    InitialStock,
}

impl MovementReason {
    /// Whether this reason moves `stock_on_hand` (as opposed to only the
    /// reservation counter). The on-hand audit invariant sums exactly these.
    pub fn affects_on_hand(&self) -> bool {
        matches!(
            self,
            MovementReason::CommitOnPayment
                | MovementReason::RefundRestock
                | MovementReason::ManualAdjust
                | MovementReason::InitialStock
        )
    }
}

/// One immutable row in the append-only stock movement log.
///
/// Every ledger mutation writes exactly one movement in the same transaction
/// as the counter update. Movements are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub variant_id: String,
    /// Signed quantity. Positive for reserve/restock/initial, negative for
    /// release/commit; manual adjustments carry their own sign.
    pub delta: i64,
    pub reason: MovementReason,
    /// Who triggered the movement: "checkout", "payment-callback", an admin
    /// user id, etc.
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Order
// =============================================================================

/// The status of an order.
///
/// Mutated only through the state machine; see [`crate::states`] for the
/// transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created at checkout, payment not yet verified. Stock is reserved.
    Pending,
    /// Payment verified, stock committed, being prepared.
    Processing,
    Shipped,
    Delivered,
    /// Terminal.
    Canceled,
    /// Terminal.
    Refunded,
    Returned,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

/// A customer order. Created in `pending`; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub status: OrderStatus,
    /// Sum of item line totals.
    pub subtotal_cents: i64,
    /// Flat shipping cost snapshot from Settings at checkout time.
    pub shipping_cents: i64,
    /// subtotal + shipping.
    pub total_cents: i64,
    /// Affiliate who referred this order, if any. Drives commission creation.
    pub ref_affiliate_id: Option<String>,
    /// Opaque token issued by the payment gateway for this order's session.
    pub authority_token: Option<String>,
    /// Gateway settlement reference recorded on successful verification.
    pub settlement_ref: Option<String>,
    /// Free-form destination captured at checkout.
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line item in an order.
/// Uses snapshot pattern to freeze the unit price at order-creation time -
/// immutable even if the variant's price changes later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub variant_id: String,
    pub quantity: i64,
    /// Unit price at time of order (frozen).
    pub unit_price_cents: i64,
    /// unit_price × quantity (frozen).
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Affiliate
// =============================================================================

/// A marketing affiliate. Affiliates form a referral tree at most two levels
/// deep for commission purposes: the referring affiliate earns level 1, its
/// parent (if any) earns level 2.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Affiliate {
    pub id: String,
    pub display_name: String,
    /// The affiliate who recruited this one, if any.
    pub parent_affiliate_id: Option<String>,
    /// Bank account for payouts. Required before a payout can be requested.
    pub bank_iban: Option<String>,
    pub bank_holder: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Affiliate {
    /// Whether payouts can be sent to this affiliate.
    #[inline]
    pub fn has_bank_details(&self) -> bool {
        self.bank_iban.is_some() && self.bank_holder.is_some()
    }
}

// =============================================================================
// Commission
// =============================================================================

/// Lifecycle of a commission row.
///
/// ```text
/// pending ──► available ──► paid (terminal)
///    │            │
///    └────────────┴───────► void (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    /// Order paid but not yet delivered.
    Pending,
    /// Order delivered; counts toward the affiliate's payable balance.
    Available,
    /// Consumed by a paid-out payout request.
    Paid,
    /// Order was canceled/refunded/returned.
    Void,
}

/// A commission owed to an affiliate for one paid order.
///
/// At most one row exists per `(order_id, level)` pair - that pair is the
/// idempotency key for commission creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Commission {
    pub id: String,
    pub affiliate_id: String,
    pub order_id: String,
    /// 1 = direct referrer, 2 = referrer's parent.
    pub level: i64,
    /// Percentage applied, snapshot from Settings at creation time.
    pub percentage: i64,
    /// floor(order total × percentage / 100), in minor units.
    pub amount_cents: i64,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Payout Request
// =============================================================================

/// Lifecycle of a payout request.
///
/// ```text
/// pending ──► approved ──► paid (terminal)
///    │            │
///    └────────────┴──────► rejected (terminal; never from paid)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Approved,
    Paid,
    Rejected,
}

/// An affiliate's request to withdraw their available commission balance.
///
/// While pending or approved, the request reserves its amount against the
/// affiliate's available balance so the same commissions cannot back two
/// requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PayoutRequest {
    pub id: String,
    pub affiliate_id: String,
    pub amount_cents: i64,
    pub status: PayoutStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Settings
// =============================================================================

/// Process-wide configuration read on each operation (via a short-TTL cache
/// with explicit invalidation, never cached indefinitely).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Settings {
    /// Level-1 commission percentage (whole percent).
    pub commission_level1_pct: i64,
    /// Level-2 commission percentage (whole percent).
    pub commission_level2_pct: i64,
    /// Flat shipping cost added to every order.
    pub flat_shipping_cents: i64,
    /// Minimum amount an affiliate may request as payout.
    pub min_payout_cents: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            commission_level1_pct: 5,
            commission_level2_pct: 2,
            flat_shipping_cents: 0,
            min_payout_cents: 100_000,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_to_sell() {
        let now = Utc::now();
        let variant = Variant {
            id: "v-1".into(),
            product_id: "p-1".into(),
            sku: "SKU-1".into(),
            name: "Blue / XL".into(),
            price_cents: 50_000,
            stock_on_hand: 5,
            stock_reserved: 3,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(variant.available_to_sell(), 2);
    }

    #[test]
    fn test_movement_reason_affects_on_hand() {
        assert!(MovementReason::CommitOnPayment.affects_on_hand());
        assert!(MovementReason::RefundRestock.affects_on_hand());
        assert!(MovementReason::ManualAdjust.affects_on_hand());
        assert!(MovementReason::InitialStock.affects_on_hand());
        assert!(!MovementReason::Reserve.affects_on_hand());
        assert!(!MovementReason::Release.affects_on_hand());
    }

    #[test]
    fn test_order_status_default() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_affiliate_bank_details() {
        let now = Utc::now();
        let mut affiliate = Affiliate {
            id: "a-1".into(),
            display_name: "Sara".into(),
            parent_affiliate_id: None,
            bank_iban: None,
            bank_holder: None,
            is_active: true,
            created_at: now,
        };
        assert!(!affiliate.has_bank_details());

        affiliate.bank_iban = Some("IR820540102680020817909002".into());
        affiliate.bank_holder = Some("Sara".into());
        assert!(affiliate.has_bank_details());
    }
}
