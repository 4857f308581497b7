//! # vitrin-db: Database Layer
//!
//! SQLite persistence for Vitrin.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         vitrin-db                                       │
//! │                                                                         │
//! │  ┌──────────┐   ┌─────────────┐   ┌──────────────────────────────────┐ │
//! │  │   pool   │──►│ migrations  │   │           repository             │ │
//! │  │ (sqlite, │   │ (embedded   │   │  inventory · order · commission  │ │
//! │  │   WAL)   │   │   .sql)     │   │  payout · settings · affiliate   │ │
//! │  └──────────┘   └─────────────┘   └──────────────────────────────────┘ │
//! │                                                                         │
//! │  Writes that must hold together cross repositories via a shared         │
//! │  `&mut SqliteConnection` borrowed from one transaction.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! - Counters and statuses change only through guarded conditional updates;
//!   `rows_affected == 0` is an outcome, not an error
//! - Every stock counter change appends a movement row in the same
//!   transaction
//! - Domain types come from vitrin-core; this crate adds persistence only

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{
    AffiliateRepository, CommissionRepository, GuardedUpdate, InventoryRepository,
    OrderRepository, PayoutRepository, SettingsRepository,
};
