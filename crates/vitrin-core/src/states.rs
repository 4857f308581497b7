//! # Order Lifecycle
//!
//! The order status transition table and the side effects bound to each edge.
//!
//! ## Transition Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Order State Machine                                │
//! │                                                                         │
//! │  pending ──► processing ──► shipped ──► delivered ──► returned         │
//! │     │             │            │            │             │            │
//! │     │             │            │            │             │            │
//! │     ▼             ▼            ▼            ▼             ▼            │
//! │  canceled      canceled     refunded     refunded      refunded        │
//! │                                                                         │
//! │  canceled, refunded: terminal (no further transitions)                 │
//! │  self-transition (same → same): no-op success                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Side Effects
//! Each legal edge may carry a stock effect and/or a commission effect. The
//! engine executes them in the **same transaction** as the status write, so
//! a failed ledger operation leaves the status untouched.

use crate::error::{CoreError, CoreResult};
use crate::types::OrderStatus;

// =============================================================================
// Transition Table
// =============================================================================

/// Returns true if `from -> to` is an edge of the lifecycle.
///
/// Only listed edges are legal; everything else is rejected. A
/// self-transition is not an edge - callers treat it as a no-op success
/// before consulting the table.
pub fn is_legal_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (Pending, Processing)
            | (Pending, Canceled)
            | (Processing, Shipped)
            | (Processing, Canceled)
            | (Shipped, Delivered)
            | (Shipped, Refunded)
            | (Delivered, Returned)
            | (Delivered, Refunded)
            | (Returned, Refunded)
    )
}

/// Whether a status admits no further transitions.
pub fn is_terminal(status: OrderStatus) -> bool {
    matches!(status, OrderStatus::Canceled | OrderStatus::Refunded)
}

/// Validates a requested transition for an order.
///
/// ## Returns
/// * `Ok(true)` - legal edge, apply it (with its side effects)
/// * `Ok(false)` - self-transition, no-op success
/// * `Err(InvalidTransition)` - not an edge; nothing may change
pub fn validate_transition(
    order_id: &str,
    from: OrderStatus,
    to: OrderStatus,
) -> CoreResult<bool> {
    if from == to {
        return Ok(false);
    }
    if is_legal_transition(from, to) {
        Ok(true)
    } else {
        Err(CoreError::InvalidTransition {
            order_id: order_id.to_string(),
            from,
            to,
        })
    }
}

// =============================================================================
// Side Effects
// =============================================================================

/// What the inventory ledger must do when an order takes an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    /// No ledger change.
    None,
    /// Drop the reservation (cancel before payment).
    Release,
    /// Return committed units to on-hand (cancel/refund after payment).
    Restock,
}

/// What the commission engine must do when an order takes an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommissionEffect {
    None,
    /// Delivery confirmed: pending commissions become payable.
    MakeAvailable,
    /// Order unwound: outstanding commissions are voided.
    Void,
}

/// Stock side effect for a legal edge.
///
/// Canceling from `pending` releases the reservation; the post-payment
/// unwind edges (`processing -> canceled`, `shipped -> refunded`,
/// `delivered -> refunded`) restock the committed units. Edges through
/// `returned` carry no stock effect of their own. Pairs outside the
/// transition table are kept out of this map so it stays in lockstep with
/// `is_legal_transition`.
pub fn stock_effect(from: OrderStatus, to: OrderStatus) -> StockEffect {
    use OrderStatus::*;
    match (from, to) {
        (Pending, Canceled) => StockEffect::Release,
        (Processing, Canceled) | (Shipped, Refunded) | (Delivered, Refunded) => {
            StockEffect::Restock
        }
        _ => StockEffect::None,
    }
}

/// Commission side effect for a legal edge, keyed on the entered status.
pub fn commission_effect(to: OrderStatus) -> CommissionEffect {
    use OrderStatus::*;
    match to {
        Delivered => CommissionEffect::MakeAvailable,
        Canceled | Refunded | Returned => CommissionEffect::Void,
        _ => CommissionEffect::None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn test_legal_edges() {
        assert!(is_legal_transition(Pending, Processing));
        assert!(is_legal_transition(Pending, Canceled));
        assert!(is_legal_transition(Processing, Shipped));
        assert!(is_legal_transition(Processing, Canceled));
        assert!(is_legal_transition(Shipped, Delivered));
        assert!(is_legal_transition(Shipped, Refunded));
        assert!(is_legal_transition(Delivered, Returned));
        assert!(is_legal_transition(Delivered, Refunded));
        assert!(is_legal_transition(Returned, Refunded));
    }

    #[test]
    fn test_illegal_edges() {
        // Backwards
        assert!(!is_legal_transition(Delivered, Processing));
        assert!(!is_legal_transition(Shipped, Processing));
        assert!(!is_legal_transition(Processing, Pending));
        // Skipping
        assert!(!is_legal_transition(Pending, Shipped));
        assert!(!is_legal_transition(Pending, Delivered));
        // Out of terminal states
        assert!(!is_legal_transition(Canceled, Processing));
        assert!(!is_legal_transition(Refunded, Pending));
        assert!(!is_legal_transition(Canceled, Refunded));
    }

    #[test]
    fn test_terminal_states() {
        assert!(is_terminal(Canceled));
        assert!(is_terminal(Refunded));
        assert!(!is_terminal(Pending));
        assert!(!is_terminal(Returned));
    }

    #[test]
    fn test_self_transition_is_noop() {
        assert_eq!(validate_transition("o-1", Shipped, Shipped).unwrap(), false);
    }

    #[test]
    fn test_validate_rejects_with_context() {
        let err = validate_transition("o-1", Delivered, Processing).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                from: Delivered,
                to: Processing,
                ..
            }
        ));
    }

    #[test]
    fn test_stock_effects() {
        // Cancel before payment: reservation is released
        assert_eq!(stock_effect(Pending, Canceled), StockEffect::Release);
        // Cancel/refund after payment: committed stock comes back
        assert_eq!(stock_effect(Processing, Canceled), StockEffect::Restock);
        assert_eq!(stock_effect(Shipped, Refunded), StockEffect::Restock);
        assert_eq!(stock_effect(Delivered, Refunded), StockEffect::Restock);
        // Plain forward progress moves no stock
        assert_eq!(stock_effect(Pending, Processing), StockEffect::None);
        assert_eq!(stock_effect(Delivered, Returned), StockEffect::None);
        assert_eq!(stock_effect(Returned, Refunded), StockEffect::None);
    }

    #[test]
    fn test_stock_effects_only_on_legal_edges() {
        let all = [
            Pending, Processing, Shipped, Delivered, Returned, Canceled, Refunded,
        ];
        for from in all {
            for to in all {
                if stock_effect(from, to) != StockEffect::None {
                    assert!(
                        is_legal_transition(from, to),
                        "stock effect bound to a non-edge: {from:?} -> {to:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_commission_effects() {
        assert_eq!(commission_effect(Delivered), CommissionEffect::MakeAvailable);
        assert_eq!(commission_effect(Canceled), CommissionEffect::Void);
        assert_eq!(commission_effect(Refunded), CommissionEffect::Void);
        assert_eq!(commission_effect(Returned), CommissionEffect::Void);
        assert_eq!(commission_effect(Processing), CommissionEffect::None);
        assert_eq!(commission_effect(Shipped), CommissionEffect::None);
    }
}
