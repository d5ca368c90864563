//! # entente-store
//!
//! SQLite persistence for per-call token usage, attributed to game, agent
//! and phase.

pub mod database;
pub mod error;
pub mod schema;
pub mod usage;

pub use database::Database;
pub use error::StoreError;
pub use usage::{AgentUsage, UsageRecord, UsageRepo, UsageSink, UsageTotals};
