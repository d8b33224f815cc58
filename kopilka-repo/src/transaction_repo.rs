use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::cmp::Ordering::Equal;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::user_repo::UserId;

#[async_trait]
pub trait TransactionRepo: Sync + Send {
    async fn get_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
    ) -> Result<Transaction, TransactionRepoError>;

    async fn get_all_transactions(
        &self,
        user: UserId,
        filter: Filter,
    ) -> Result<Vec<Transaction>, TransactionRepoError>;

    async fn create_new_transaction(
        &self,
        user: UserId,
        new_transaction: NewTransaction,
    ) -> Result<Transaction, TransactionRepoError>;

    /// Partial update. Only the `Some` fields of `update` are applied.
    async fn update_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
        update: TransactionUpdate,
    ) -> Result<Transaction, TransactionRepoError>;

    /// Returns the deleted row so the caller can clean up its receipt image.
    async fn delete_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
    ) -> Result<Transaction, TransactionRepoError>;
}

#[derive(Error, Debug)]
pub enum TransactionRepoError {
    #[error("Transaction with id {0} not found")]
    TransactionNotFound(i32),
    #[error("Transaction with id {0} belongs to another user")]
    AccessDenied(i32),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("Invalid transaction type: {0}")]
pub struct InvalidTransactionType(pub String);

impl FromStr for TransactionType {
    type Err = InvalidTransactionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(InvalidTransactionType(other.to_owned())),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Transaction {
    pub id: i32,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub description: String,
    pub date: NaiveDateTime,
    pub category_id: i32,
    pub receipt_image: Option<String>,
}

impl PartialOrd for Transaction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let date_ordering = self.date.partial_cmp(&other.date);
        if let Some(Equal) = date_ordering {
            self.id.partial_cmp(&other.id)
        } else {
            date_ordering
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NewTransaction {
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub description: String,
    pub date: NaiveDateTime,
    pub category_id: i32,
    pub receipt_image: Option<String>,
}

impl NewTransaction {
    pub fn to_transaction(&self, id: i32) -> Transaction {
        Transaction {
            id,
            amount: self.amount,
            transaction_type: self.transaction_type,
            description: self.description.clone(),
            date: self.date,
            category_id: self.category_id,
            receipt_image: self.receipt_image.clone(),
        }
    }
}

#[derive(Clone, Default, Debug)]
pub struct TransactionUpdate {
    pub amount: Option<Decimal>,
    pub transaction_type: Option<TransactionType>,
    pub description: Option<String>,
    pub date: Option<NaiveDateTime>,
    pub category_id: Option<i32>,
    /// `Some(None)` clears the receipt image.
    pub receipt_image: Option<Option<String>>,
}

impl TransactionUpdate {
    pub fn apply_to(&self, transaction: &mut Transaction) {
        if let Some(amount) = self.amount {
            transaction.amount = amount;
        }
        if let Some(transaction_type) = self.transaction_type {
            transaction.transaction_type = transaction_type;
        }
        if let Some(description) = &self.description {
            transaction.description = description.clone();
        }
        if let Some(date) = self.date {
            transaction.date = date;
        }
        if let Some(category_id) = self.category_id {
            transaction.category_id = category_id;
        }
        if let Some(receipt_image) = &self.receipt_image {
            transaction.receipt_image = receipt_image.clone();
        }
    }
}

/// Date predicate is `from <= date < until`.
#[derive(Clone, Default, Debug)]
pub struct Filter {
    pub from: Option<NaiveDateTime>,
    pub until: Option<NaiveDateTime>,
    pub category_id: Option<i32>,
    pub transaction_type: Option<TransactionType>,
}

impl Filter {
    pub const NONE: Filter = Filter {
        from: None,
        until: None,
        category_id: None,
        transaction_type: None,
    };

    pub fn matches(&self, transaction: &Transaction) -> bool {
        if let Some(from) = self.from {
            if transaction.date < from {
                return false;
            }
        }
        if let Some(until) = self.until {
            if transaction.date >= until {
                return false;
            }
        }
        if let Some(category_id) = self.category_id {
            if transaction.category_id != category_id {
                return false;
            }
        }
        if let Some(transaction_type) = self.transaction_type {
            if transaction.transaction_type != transaction_type {
                return false;
            }
        }
        true
    }
}
