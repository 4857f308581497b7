//! # Input Validation
//!
//! Business rule validation for caller-supplied input. Runs **before** any
//! transaction opens, so malformed input never reaches the store.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::{MAX_BASKET_ITEMS, MAX_ITEM_QUANTITY};

/// One requested line of a checkout basket, as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasketItem {
    pub variant_id: String,
    pub quantity: i64,
}

/// Validates a checkout request's shape.
///
/// Checks, in order:
/// 1. customer id present
/// 2. basket non-empty and within size bounds
/// 3. every line has a variant id and a quantity in `1..=MAX_ITEM_QUANTITY`
///
/// Stock availability is NOT checked here - that is the ledger's guarded
/// reserve, which must run inside the transaction.
pub fn validate_checkout(customer_id: &str, items: &[BasketItem]) -> Result<(), ValidationError> {
    if customer_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "customer_id".to_string(),
        });
    }

    if items.is_empty() {
        return Err(ValidationError::EmptyBasket);
    }

    if items.len() > MAX_BASKET_ITEMS {
        return Err(ValidationError::BasketTooLarge {
            max: MAX_BASKET_ITEMS,
        });
    }

    for item in items {
        if item.variant_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "variant_id".to_string(),
            });
        }
        if item.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            });
        }
        if item.quantity > MAX_ITEM_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: MAX_ITEM_QUANTITY,
            });
        }
    }

    Ok(())
}

/// Validates a payout request amount's shape (positivity only - balance and
/// minimum checks need the store and live in the payout service).
pub fn validate_payout_amount(amount_cents: i64) -> Result<(), ValidationError> {
    if amount_cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(variant_id: &str, quantity: i64) -> BasketItem {
        BasketItem {
            variant_id: variant_id.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_valid_basket() {
        assert!(validate_checkout("cust-1", &[item("v-1", 3)]).is_ok());
    }

    #[test]
    fn test_missing_customer() {
        let err = validate_checkout("  ", &[item("v-1", 1)]).unwrap_err();
        assert!(matches!(err, ValidationError::Required { .. }));
    }

    #[test]
    fn test_empty_basket() {
        let err = validate_checkout("cust-1", &[]).unwrap_err();
        assert!(matches!(err, ValidationError::EmptyBasket));
    }

    #[test]
    fn test_zero_and_negative_quantity() {
        assert!(validate_checkout("cust-1", &[item("v-1", 0)]).is_err());
        assert!(validate_checkout("cust-1", &[item("v-1", -2)]).is_err());
    }

    #[test]
    fn test_quantity_too_large() {
        let err = validate_checkout("cust-1", &[item("v-1", MAX_ITEM_QUANTITY + 1)]).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { .. }));
    }

    #[test]
    fn test_basket_too_large() {
        let items: Vec<BasketItem> = (0..=MAX_BASKET_ITEMS)
            .map(|i| item(&format!("v-{i}"), 1))
            .collect();
        let err = validate_checkout("cust-1", &items).unwrap_err();
        assert!(matches!(err, ValidationError::BasketTooLarge { .. }));
    }

    #[test]
    fn test_payout_amount() {
        assert!(validate_payout_amount(120_000).is_ok());
        assert!(validate_payout_amount(0).is_err());
        assert!(validate_payout_amount(-5).is_err());
    }
}
