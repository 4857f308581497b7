//! # vitrin-core: Pure Business Logic for Vitrin
//!
//! This crate is the **heart** of the Vitrin fulfillment engine. It contains
//! all business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Vitrin Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          External Callers (storefront UI / admin API)          │   │
//! │  │   checkout, payment callback, status change, payout requests   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    vitrin-engine                                │   │
//! │  │   CheckoutService, PaymentService, OrderService,               │   │
//! │  │   CommissionEngine, PayoutService                              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ vitrin-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  states   │  │ validation│  │   │
//! │  │   │  Variant  │  │   Money   │  │ lifecycle │  │   rules   │  │   │
//! │  │   │   Order   │  │ pct floor │  │  effects  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    vitrin-db (Database Layer)                   │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Variant, Order, Commission, PayoutRequest, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`states`] - Order status transition table and bound side effects
//! - [`commission`] - Two-level commission math
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are minor units (i64), never floats
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod commission;
pub mod error;
pub mod money;
pub mod states;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use vitrin_core::Money` instead of
// `use vitrin_core::money::Money`

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct items allowed in a single checkout basket
///
/// ## Business Reason
/// Prevents runaway baskets and ensures reasonable transaction sizes.
pub const MAX_BASKET_ITEMS: usize = 100;

/// Maximum quantity of a single variant in one order
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Default TTL for the settings cache, in seconds.
///
/// Settings (commission percentages, shipping cost, payout minimum) are
/// slow-changing; operations re-read them after this interval or after an
/// explicit invalidation.
pub const SETTINGS_TTL_SECS: u64 = 30;
