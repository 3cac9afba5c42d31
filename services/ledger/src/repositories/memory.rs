//! In-process ledger used by tests and database-less runs

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::LedgerRepository;
use crate::models::{Goal, NewGoal, NewTransaction, Transaction};

#[derive(Default)]
struct Tables {
    next_id: i64,
    transactions: Vec<Transaction>,
    goals: Vec<Goal>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct InMemoryLedger {
    tables: Mutex<Tables>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerRepository for InMemoryLedger {
    async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        let mut transactions = self.tables.lock().await.transactions.clone();
        transactions.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(transactions)
    }

    async fn insert_transaction(&self, transaction: &NewTransaction) -> Result<Transaction> {
        let mut tables = self.tables.lock().await;
        let row = Transaction {
            id: tables.next_id(),
            kind: transaction.kind,
            amount: transaction.amount,
            description: transaction.description.clone(),
            date: transaction.date_or_today(),
        };
        tables.transactions.push(row.clone());
        Ok(row)
    }

    async fn delete_transaction(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.transactions.len();
        tables.transactions.retain(|t| t.id != id);
        Ok(tables.transactions.len() < before)
    }

    async fn list_goals(&self) -> Result<Vec<Goal>> {
        Ok(self.tables.lock().await.goals.clone())
    }

    async fn insert_goal(&self, goal: &NewGoal) -> Result<Goal> {
        let mut tables = self.tables.lock().await;
        let row = Goal {
            id: tables.next_id(),
            title: goal.title.trim().to_string(),
            target_amount: goal.target_amount,
            saved_amount: goal.saved_amount,
            deadline: goal.deadline,
        };
        tables.goals.push(row.clone());
        Ok(row)
    }

    async fn contribute(&self, id: i64, amount: f64) -> Result<Option<Goal>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.goals.iter_mut().find(|g| g.id == id).map(|goal| {
            goal.saved_amount += amount;
            goal.clone()
        }))
    }
}
