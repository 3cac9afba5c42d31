//! Repositories for ledger records

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Goal, NewGoal, NewTransaction, Transaction};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryLedger;
pub use postgres::PgLedgerRepository;

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// All transactions, newest date first
    async fn list_transactions(&self) -> Result<Vec<Transaction>>;

    async fn insert_transaction(&self, transaction: &NewTransaction) -> Result<Transaction>;

    /// Returns false when no transaction had this id
    async fn delete_transaction(&self, id: i64) -> Result<bool>;

    async fn list_goals(&self) -> Result<Vec<Goal>>;

    async fn insert_goal(&self, goal: &NewGoal) -> Result<Goal>;

    /// Add `amount` to the goal's saved amount; `None` when the goal is missing
    async fn contribute(&self, id: i64, amount: f64) -> Result<Option<Goal>>;
}
