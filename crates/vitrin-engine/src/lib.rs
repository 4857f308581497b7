//! # vitrin-engine: Orchestration Layer
//!
//! Wires the pure domain logic (vitrin-core) and the persistence layer
//! (vitrin-db) into the transactional services the storefront and admin
//! callers use.
//!
//! ## Services
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        vitrin-engine                                    │
//! │                                                                         │
//! │  CheckoutService   basket → reserved stock + pending order             │
//! │  PaymentService    gateway sessions + idempotent callback verify       │
//! │  OrderService      lifecycle transitions with bound side effects       │
//! │  CommissionEngine  two-level commissions per paid order                │
//! │  PayoutService     exact-balance requests, FIFO settlement             │
//! │                                                                         │
//! │  shared: SettingsCache (TTL + invalidate)                              │
//! │          Arc<dyn PaymentGateway> (HTTP in production, mock in tests)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every cross-entity mutation runs inside a single database transaction
//! opened here and threaded through the repositories as a
//! `&mut SqliteConnection`; partial effects are never visible.

pub mod checkout;
pub mod commission;
pub mod error;
pub mod gateway;
pub mod orders;
pub mod payment;
pub mod payout;
pub mod settings;

pub use checkout::{CheckoutRequest, CheckoutService};
pub use commission::CommissionEngine;
pub use error::{EngineError, EngineResult};
pub use gateway::{
    GatewayError, HttpPaymentGateway, MockGateway, MockVerifyBehavior, PaymentGateway, Session,
    SessionRequest, Settlement,
};
pub use orders::OrderService;
pub use payment::{CallbackFlag, PaymentService, VerifyOutcome};
pub use payout::PayoutService;
pub use settings::SettingsCache;
