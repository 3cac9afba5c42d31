//! Custom error types for the common library
//!
//! Errors raised by the shared infrastructure layers (relational store and
//! key-value cache). Services wrap these into their own error enums.

use redis::RedisError;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors raised by the key-value cache
#[derive(Error, Debug)]
pub enum CacheError {
    /// The client could not be created or a connection could not be opened
    #[error("Cache connection error: {0}")]
    Connection(#[source] RedisError),

    /// A cache command failed
    #[error("Cache command error: {0}")]
    Command(#[source] RedisError),
}

/// Type alias for Result with CacheError
pub type CacheResult<T> = Result<T, CacheError>;
