use crate::sqlx_repo::SQLxRepo;
use crate::transaction_repo::TransactionRepoError::{AccessDenied, TransactionNotFound};
use crate::transaction_repo::{
    Filter, NewTransaction, Transaction, TransactionRepo, TransactionRepoError, TransactionUpdate,
};
use crate::user_repo::UserId;
use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder};
use tracing::instrument;

#[derive(sqlx::FromRow)]
struct TransactionEntry {
    id: i32,
    amount: Decimal,
    transaction_type: String,
    description: String,
    date: NaiveDateTime,
    user_id: UserId,
    category_id: i32,
    receipt_image: Option<String>,
}

impl TransactionEntry {
    fn into_transaction(self) -> Result<Transaction, TransactionRepoError> {
        let transaction_type = self
            .transaction_type
            .parse()
            .with_context(|| format!("Corrupt type on transaction {}", self.id))?;
        Ok(Transaction {
            id: self.id,
            amount: self.amount,
            transaction_type,
            description: self.description,
            date: self.date,
            category_id: self.category_id,
            receipt_image: self.receipt_image,
        })
    }
}

impl SQLxRepo {
    async fn get_transaction_entry(
        &self,
        transaction_id: i32,
    ) -> Result<Option<TransactionEntry>, TransactionRepoError> {
        let entry = sqlx::query_as::<Postgres, TransactionEntry>(
            "SELECT * FROM transactions WHERE id = $1",
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Unable to get transaction {}", transaction_id))?;
        Ok(entry)
    }

    /// Loads the row and maps missing/foreign ids to the matching error.
    async fn get_owned_entry(
        &self,
        user: UserId,
        transaction_id: i32,
    ) -> Result<TransactionEntry, TransactionRepoError> {
        let entry = self
            .get_transaction_entry(transaction_id)
            .await?
            .ok_or(TransactionNotFound(transaction_id))?;
        if entry.user_id != user {
            return Err(AccessDenied(transaction_id));
        }
        Ok(entry)
    }
}

#[async_trait]
impl TransactionRepo for SQLxRepo {
    #[instrument(skip(self))]
    async fn get_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
    ) -> Result<Transaction, TransactionRepoError> {
        self.get_owned_entry(user, transaction_id)
            .await?
            .into_transaction()
    }

    #[instrument(skip(self))]
    async fn get_all_transactions(
        &self,
        user: UserId,
        filter: Filter,
    ) -> Result<Vec<Transaction>, TransactionRepoError> {
        let mut query_builder =
            QueryBuilder::<Postgres>::new("SELECT * FROM transactions WHERE user_id = ");
        query_builder.push_bind(user);
        if let Some(from) = filter.from {
            query_builder.push(" AND date >= ").push_bind(from);
        }
        if let Some(until) = filter.until {
            query_builder.push(" AND date < ").push_bind(until);
        }
        if let Some(category_id) = filter.category_id {
            query_builder
                .push(" AND category_id = ")
                .push_bind(category_id);
        }
        if let Some(transaction_type) = filter.transaction_type {
            query_builder
                .push(" AND transaction_type = ")
                .push_bind(transaction_type.as_str());
        }
        query_builder.push(" ORDER BY date DESC, id DESC");

        let entries: Vec<TransactionEntry> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Unable to get transactions for user {}", user))?;

        entries
            .into_iter()
            .map(TransactionEntry::into_transaction)
            .collect()
    }

    #[instrument(skip(self, new_transaction))]
    async fn create_new_transaction(
        &self,
        user: UserId,
        new_transaction: NewTransaction,
    ) -> Result<Transaction, TransactionRepoError> {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO transactions(amount, transaction_type, description, date, user_id, category_id, receipt_image) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(new_transaction.amount)
        .bind(new_transaction.transaction_type.as_str())
        .bind(&new_transaction.description)
        .bind(new_transaction.date)
        .bind(user)
        .bind(new_transaction.category_id)
        .bind(&new_transaction.receipt_image)
        .fetch_one(&self.pool)
        .await
        .context("Unable to insert transaction")?;

        Ok(new_transaction.to_transaction(id))
    }

    #[instrument(skip(self, update))]
    async fn update_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
        update: TransactionUpdate,
    ) -> Result<Transaction, TransactionRepoError> {
        let mut transaction = self
            .get_owned_entry(user, transaction_id)
            .await?
            .into_transaction()?;
        update.apply_to(&mut transaction);

        let result = sqlx::query(
            "UPDATE transactions SET amount = $1, transaction_type = $2, description = $3, \
             date = $4, category_id = $5, receipt_image = $6 WHERE id = $7 AND user_id = $8",
        )
        .bind(transaction.amount)
        .bind(transaction.transaction_type.as_str())
        .bind(&transaction.description)
        .bind(transaction.date)
        .bind(transaction.category_id)
        .bind(&transaction.receipt_image)
        .bind(transaction_id)
        .bind(user)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Unable to update transaction {}", transaction_id))?;

        if result.rows_affected() == 0 {
            // deleted between the read and the write; last write wins otherwise
            Err(TransactionNotFound(transaction_id))
        } else {
            Ok(transaction)
        }
    }

    #[instrument(skip(self))]
    async fn delete_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
    ) -> Result<Transaction, TransactionRepoError> {
        // read first so a foreign id is reported as AccessDenied, not deleted
        self.get_owned_entry(user, transaction_id).await?;

        let entry = sqlx::query_as::<Postgres, TransactionEntry>(
            "DELETE FROM transactions WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(transaction_id)
        .bind(user)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Unable to delete transaction {}", transaction_id))?
        .ok_or(TransactionNotFound(transaction_id))?;

        entry.into_transaction()
    }
}
