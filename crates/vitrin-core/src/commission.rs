//! # Commission Math
//!
//! Pure computation of the two-level commission plan for a paid order.
//!
//! ## How Commissions Work
//! ```text
//! Order (total 250,000, referred by affiliate B)
//!      │
//!      ▼
//! Level 1: B earns floor(250,000 × pct1 / 100)
//!      │
//!      ▼
//! Level 2: B's parent A (if any) earns floor(250,000 × pct2 / 100)
//! ```
//!
//! Orders without a referring affiliate produce no commissions. Persistence
//! and idempotency live in the engine layer; this module only computes.

use crate::money::Money;
use crate::types::Settings;

/// One commission to be recorded for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionPlan {
    pub affiliate_id: String,
    /// 1 = direct referrer, 2 = referrer's parent.
    pub level: i64,
    /// The percentage applied (snapshot for the ledger row).
    pub percentage: i64,
    pub amount: Money,
}

/// Computes the commission plan for an order.
///
/// ## Arguments
/// * `total` - the order total
/// * `ref_affiliate_id` - the referring affiliate, if any
/// * `parent_affiliate_id` - that affiliate's own referrer, if any
/// * `settings` - current percentages
///
/// ## Returns
/// Zero, one, or two planned commissions. Zero-amount plans are kept: a row
/// per (order, level) is the idempotency anchor even when the percentage
/// floors the amount to zero.
pub fn plan_for_order(
    total: Money,
    ref_affiliate_id: Option<&str>,
    parent_affiliate_id: Option<&str>,
    settings: &Settings,
) -> Vec<CommissionPlan> {
    let Some(level1) = ref_affiliate_id else {
        return Vec::new();
    };

    let mut plans = vec![CommissionPlan {
        affiliate_id: level1.to_string(),
        level: 1,
        percentage: settings.commission_level1_pct,
        amount: total.percent_floor(settings.commission_level1_pct),
    }];

    if let Some(level2) = parent_affiliate_id {
        plans.push(CommissionPlan {
            affiliate_id: level2.to_string(),
            level: 2,
            percentage: settings.commission_level2_pct,
            amount: total.percent_floor(settings.commission_level2_pct),
        });
    }

    plans
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            commission_level1_pct: 5,
            commission_level2_pct: 2,
            flat_shipping_cents: 0,
            min_payout_cents: 100_000,
        }
    }

    #[test]
    fn test_no_referrer_no_commissions() {
        let plans = plan_for_order(Money::from_cents(250_000), None, None, &settings());
        assert!(plans.is_empty());

        // A parent without a direct referrer is impossible input; still empty.
        let plans = plan_for_order(Money::from_cents(250_000), None, Some("a-parent"), &settings());
        assert!(plans.is_empty());
    }

    #[test]
    fn test_level1_only() {
        let plans = plan_for_order(Money::from_cents(250_000), Some("a-1"), None, &settings());
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].affiliate_id, "a-1");
        assert_eq!(plans[0].level, 1);
        assert_eq!(plans[0].percentage, 5);
        assert_eq!(plans[0].amount.cents(), 12_500);
    }

    #[test]
    fn test_two_levels() {
        let plans = plan_for_order(
            Money::from_cents(250_000),
            Some("a-child"),
            Some("a-parent"),
            &settings(),
        );
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[1].affiliate_id, "a-parent");
        assert_eq!(plans[1].level, 2);
        assert_eq!(plans[1].amount.cents(), 5_000);
    }

    #[test]
    fn test_amounts_floor() {
        // floor(999 * 5 / 100) = 49, floor(999 * 2 / 100) = 19
        let plans = plan_for_order(Money::from_cents(999), Some("a"), Some("b"), &settings());
        assert_eq!(plans[0].amount.cents(), 49);
        assert_eq!(plans[1].amount.cents(), 19);
    }
}
