//! # Error Types
//!
//! Domain-specific error types for vitrin-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  vitrin-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  vitrin-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  vitrin-engine errors (separate crate)                                 │
//! │  └── EngineError      - Orchestration + gateway failures               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → Caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (variant id, order id, amounts)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a specific caller-visible outcome

use thiserror::Error;

use crate::types::{CommissionStatus, OrderStatus, PayoutStatus};

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations: guarded updates that
/// fail, lifecycle transitions that are not in the transition table, and
/// idempotency conflicts. They never indicate partial mutation - the
/// operation that raised them left the store unchanged.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Variant cannot be found.
    #[error("Variant not found: {0}")]
    VariantNotFound(String),

    /// Order cannot be found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Affiliate cannot be found.
    #[error("Affiliate not found: {0}")]
    AffiliateNotFound(String),

    /// Payout request cannot be found.
    #[error("Payout request not found: {0}")]
    PayoutNotFound(String),

    /// Not enough available-to-sell stock to reserve.
    ///
    /// ## When This Occurs
    /// The conditional reserve guard `on_hand - reserved >= qty` failed.
    /// Under concurrent checkouts for the last unit, exactly one caller
    /// succeeds and the others receive this error.
    #[error("Out of stock for variant {variant_id}: available {available}, requested {requested}")]
    OutOfStock {
        variant_id: String,
        available: i64,
        requested: i64,
    },

    /// A ledger guard failed (reserved would go negative, or on-hand would
    /// drop below reserved). Indicates a caller bug or an externally
    /// reversed reservation; the counters were not changed.
    #[error("Stock guard failed for variant {variant_id}: {detail}")]
    StockGuardFailed { variant_id: String, detail: String },

    /// Requested order status transition is not an edge of the lifecycle.
    #[error("Invalid transition for order {order_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Payment callback carried an authority token that does not match the
    /// one stored on the order. No state change is performed.
    #[error("Authority mismatch for order {order_id}")]
    AuthorityMismatch { order_id: String },

    /// Affiliate has no bank details on file; payout cannot be requested.
    #[error("Affiliate {affiliate_id} has no bank details on file")]
    MissingBankDetails { affiliate_id: String },

    /// Payout amount is below the configured minimum.
    #[error("Payout amount {requested} is below the minimum {minimum}")]
    BelowMinimumPayout { requested: i64, minimum: i64 },

    /// Payout amount exceeds, or does not exactly equal, the affiliate's
    /// available balance (available commissions minus amounts reserved by
    /// pending/approved requests). Partial-balance requests are rejected
    /// by design.
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: i64, available: i64 },

    /// FIFO commission consumption could not land exactly on the payout
    /// amount. Nothing was mutated.
    #[error("Balance mismatch paying out {payout_id}: consumed {consumed}, expected {expected}")]
    BalanceMismatch {
        payout_id: String,
        consumed: i64,
        expected: i64,
    },

    /// Payout request is not in a status that allows the operation.
    #[error("Payout {payout_id} is {status:?}, cannot perform operation")]
    InvalidPayoutStatus {
        payout_id: String,
        status: PayoutStatus,
    },

    /// Commission is not in a status that allows the operation.
    #[error("Commission {commission_id} is {status:?}, cannot perform operation")]
    InvalidCommissionStatus {
        commission_id: String,
        status: CommissionStatus,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur before any transaction opens: malformed input never reaches
/// the store.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// The checkout basket contains no items.
    #[error("Basket is empty")]
    EmptyBasket,

    /// The checkout basket has too many distinct items.
    #[error("Basket cannot have more than {max} items")]
    BasketTooLarge { max: usize },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::OutOfStock {
            variant_id: "v-1".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Out of stock for variant v-1: available 3, requested 5"
        );
    }

    #[test]
    fn test_transition_error_message() {
        let err = CoreError::InvalidTransition {
            order_id: "o-1".to_string(),
            from: OrderStatus::Delivered,
            to: OrderStatus::Processing,
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition for order o-1: Delivered -> Processing"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "customer_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
