//! Ledger models for request and response payloads

use std::{fmt, str::FromStr};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(anyhow::anyhow!("unknown transaction type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub description: String,
    pub date: NaiveDate,
}

/// Request to record a transaction
#[derive(Debug, Clone, Deserialize)]
pub struct NewTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    /// Defaults to today
    pub date: Option<NaiveDate>,
}

impl NewTransaction {
    pub fn validate(&self) -> ApiResult<()> {
        if !(self.amount.is_finite() && self.amount > 0.0) {
            return Err(ApiError::BadRequest(
                "Amount must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn date_or_today(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Utc::now().date_naive())
    }
}

/// Totals over a set of transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
    pub income: f64,
    pub expenses: f64,
    pub balance: f64,
}

impl Summary {
    pub fn from_transactions<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let (income, expenses) =
            transactions
                .into_iter()
                .fold((0.0, 0.0), |(income, expenses), t| match t.kind {
                    TransactionKind::Income => (income + t.amount, expenses),
                    TransactionKind::Expense => (income, expenses + t.amount),
                });

        Summary {
            income,
            expenses,
            balance: income - expenses,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: i64,
    pub title: String,
    pub target_amount: f64,
    pub saved_amount: f64,
    pub deadline: Option<NaiveDate>,
}

impl Goal {
    /// Percentage saved, capped at 100
    pub fn progress(&self) -> f64 {
        if self.target_amount <= 0.0 {
            return 0.0;
        }
        (self.saved_amount / self.target_amount * 100.0).min(100.0)
    }

    pub fn is_complete(&self) -> bool {
        self.saved_amount >= self.target_amount
    }
}

/// A goal as returned by the API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalResponse {
    #[serde(flatten)]
    pub goal: Goal,
    pub progress: f64,
    pub completed: bool,
}

impl From<Goal> for GoalResponse {
    fn from(goal: Goal) -> Self {
        GoalResponse {
            progress: goal.progress(),
            completed: goal.is_complete(),
            goal,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub title: String,
    pub target_amount: f64,
    #[serde(default)]
    pub saved_amount: f64,
    pub deadline: Option<NaiveDate>,
}

impl NewGoal {
    pub fn validate(&self) -> ApiResult<()> {
        if self.title.trim().is_empty() {
            return Err(ApiError::BadRequest("Title is required".to_string()));
        }
        if !(self.target_amount.is_finite() && self.target_amount > 0.0) {
            return Err(ApiError::BadRequest(
                "Target amount must be greater than zero".to_string(),
            ));
        }
        if !(self.saved_amount.is_finite() && self.saved_amount >= 0.0) {
            return Err(ApiError::BadRequest(
                "Saved amount cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contribution {
    pub amount: f64,
}

impl Contribution {
    pub fn validate(&self) -> ApiResult<()> {
        if !(self.amount.is_finite() && self.amount > 0.0) {
            return Err(ApiError::BadRequest(
                "Contribution must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(kind: TransactionKind, amount: f64) -> Transaction {
        Transaction {
            id: 1,
            kind,
            amount,
            description: String::new(),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        }
    }

    fn goal(target: f64, saved: f64) -> Goal {
        Goal {
            id: 1,
            title: "Emergency fund".to_string(),
            target_amount: target,
            saved_amount: saved,
            deadline: None,
        }
    }

    #[test]
    fn summary_nets_income_against_expenses() {
        let transactions = [
            tx(TransactionKind::Income, 2500.0),
            tx(TransactionKind::Expense, 800.0),
            tx(TransactionKind::Expense, 200.0),
        ];

        let summary = Summary::from_transactions(&transactions);

        assert_eq!(summary.income, 2500.0);
        assert_eq!(summary.expenses, 1000.0);
        assert_eq!(summary.balance, 1500.0);
    }

    #[test]
    fn progress_is_capped() {
        assert_eq!(goal(1000.0, 250.0).progress(), 25.0);
        assert_eq!(goal(1000.0, 1500.0).progress(), 100.0);
        assert!(goal(1000.0, 1000.0).is_complete());
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let mut new_tx = NewTransaction {
            kind: TransactionKind::Expense,
            amount: 0.0,
            description: "Coffee".to_string(),
            date: None,
        };
        assert!(matches!(new_tx.validate(), Err(ApiError::BadRequest(_))));

        new_tx.amount = f64::NAN;
        assert!(new_tx.validate().is_err());

        new_tx.amount = 3.5;
        assert!(new_tx.validate().is_ok());

        let bad_goal = NewGoal {
            title: "Car".to_string(),
            target_amount: 5000.0,
            saved_amount: -1.0,
            deadline: None,
        };
        assert!(bad_goal.validate().is_err());
        assert!(Contribution { amount: -5.0 }.validate().is_err());
    }

    #[test]
    fn transaction_type_uses_wire_name() {
        let json = serde_json::to_value(tx(TransactionKind::Income, 10.0)).unwrap();
        assert_eq!(json["type"], "income");
        assert_eq!("expense".parse::<TransactionKind>().unwrap(), TransactionKind::Expense);
    }
}
