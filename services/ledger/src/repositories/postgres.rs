//! Ledger repository for database operations

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use super::LedgerRepository;
use crate::models::{Goal, NewGoal, NewTransaction, Transaction};

/// Ledger repository backed by PostgreSQL
#[derive(Clone)]
pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn transaction_from_row(row: PgRow) -> Result<Transaction> {
    let kind: String = row.try_get("type")?;
    Ok(Transaction {
        id: row.try_get("id")?,
        kind: kind.parse()?,
        amount: row.try_get("amount")?,
        description: row.try_get("description")?,
        date: row.try_get("date")?,
    })
}

fn goal_from_row(row: PgRow) -> Result<Goal> {
    Ok(Goal {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        target_amount: row.try_get("target_amount")?,
        saved_amount: row.try_get("saved_amount")?,
        deadline: row.try_get("deadline")?,
    })
}

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, type, amount, description, date
            FROM transactions
            ORDER BY date DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(transaction_from_row).collect()
    }

    async fn insert_transaction(&self, transaction: &NewTransaction) -> Result<Transaction> {
        let row = sqlx::query(
            r#"
            INSERT INTO transactions (type, amount, description, date)
            VALUES ($1, $2, $3, $4)
            RETURNING id, type, amount, description, date
            "#,
        )
        .bind(transaction.kind.as_str())
        .bind(transaction.amount)
        .bind(&transaction.description)
        .bind(transaction.date_or_today())
        .fetch_one(&self.pool)
        .await?;

        transaction_from_row(row)
    }

    async fn delete_transaction(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_goals(&self) -> Result<Vec<Goal>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, target_amount, saved_amount, deadline
            FROM goals
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(goal_from_row).collect()
    }

    async fn insert_goal(&self, goal: &NewGoal) -> Result<Goal> {
        let row = sqlx::query(
            r#"
            INSERT INTO goals (title, target_amount, saved_amount, deadline)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, target_amount, saved_amount, deadline
            "#,
        )
        .bind(goal.title.trim())
        .bind(goal.target_amount)
        .bind(goal.saved_amount)
        .bind(goal.deadline)
        .fetch_one(&self.pool)
        .await?;

        goal_from_row(row)
    }

    async fn contribute(&self, id: i64, amount: f64) -> Result<Option<Goal>> {
        let row = sqlx::query(
            r#"
            UPDATE goals
            SET saved_amount = saved_amount + $2
            WHERE id = $1
            RETURNING id, title, target_amount, saved_amount, deadline
            "#,
        )
        .bind(id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?;

        row.map(goal_from_row).transpose()
    }
}
