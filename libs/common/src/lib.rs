//! Common library for the finance tracker services
//!
//! Shared infrastructure used by the notifier and ledger services:
//! PostgreSQL pooling and migrations, the Redis key-value store, settings
//! loading and the matching error types.

pub mod cache;
pub mod database;
pub mod error;
pub mod settings;
