//! # Repository Pattern Implementation
//!
//! One repository per aggregate. Pool-based methods serve reads and
//! single-statement writes; associated functions taking a
//! `&mut SqliteConnection` are the transactional primitives the engine
//! composes inside `pool().begin()`.

pub mod affiliate;
pub mod commission;
pub mod inventory;
pub mod order;
pub mod payout;
pub mod settings;

pub use affiliate::AffiliateRepository;
pub use commission::CommissionRepository;
pub use inventory::{GuardedUpdate, InventoryRepository};
pub use order::OrderRepository;
pub use payout::PayoutRepository;
pub use settings::SettingsRepository;
