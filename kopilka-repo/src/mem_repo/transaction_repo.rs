use crate::transaction_repo::TransactionRepoError::{AccessDenied, TransactionNotFound};
use crate::transaction_repo::{
    Filter, NewTransaction, Transaction, TransactionRepo, TransactionRepoError, TransactionUpdate,
};
use crate::user_repo::UserId;
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

struct State {
    transactions: HashMap<i32, (UserId, Transaction)>,
    next_id: i32,
}

pub struct MemTransactionRepo {
    state: RwLock<State>,
}

impl MemTransactionRepo {
    pub fn new() -> MemTransactionRepo {
        let state = State {
            transactions: HashMap::new(),
            next_id: 1,
        };
        MemTransactionRepo {
            state: RwLock::new(state),
        }
    }

    fn read_lock(&self) -> Result<RwLockReadGuard<State>, anyhow::Error> {
        self.state
            .read()
            .map_err(|_| anyhow!("Unable to acquire lock"))
    }

    fn write_lock(&self) -> Result<RwLockWriteGuard<State>, anyhow::Error> {
        self.state
            .write()
            .map_err(|_| anyhow!("Unable to acquire lock"))
    }
}

#[async_trait]
impl TransactionRepo for MemTransactionRepo {
    async fn get_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
    ) -> Result<Transaction, TransactionRepoError> {
        let read_guard = self.read_lock()?;

        let Some((owner, transaction)) = read_guard.transactions.get(&transaction_id) else {
            return Err(TransactionNotFound(transaction_id));
        };
        if *owner != user {
            return Err(AccessDenied(transaction_id));
        }
        Ok(transaction.clone())
    }

    async fn get_all_transactions(
        &self,
        user: UserId,
        filter: Filter,
    ) -> Result<Vec<Transaction>, TransactionRepoError> {
        let read_guard = self.read_lock()?;

        let mut transactions: Vec<Transaction> = read_guard
            .transactions
            .values()
            .filter(|(owner, _)| *owner == user)
            .map(|(_, t)| t)
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        transactions.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

        Ok(transactions)
    }

    async fn create_new_transaction(
        &self,
        user: UserId,
        new_transaction: NewTransaction,
    ) -> Result<Transaction, TransactionRepoError> {
        let mut write_guard = self.write_lock()?;

        let id = write_guard.next_id;
        write_guard.next_id += 1;

        let transaction = new_transaction.to_transaction(id);
        write_guard
            .transactions
            .insert(id, (user, transaction.clone()));

        Ok(transaction)
    }

    async fn update_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
        update: TransactionUpdate,
    ) -> Result<Transaction, TransactionRepoError> {
        let mut write_guard = self.write_lock()?;

        let Some((owner, transaction)) = write_guard.transactions.get_mut(&transaction_id) else {
            return Err(TransactionNotFound(transaction_id));
        };
        if *owner != user {
            return Err(AccessDenied(transaction_id));
        }

        update.apply_to(transaction);
        Ok(transaction.clone())
    }

    async fn delete_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
    ) -> Result<Transaction, TransactionRepoError> {
        let mut write_guard = self.write_lock()?;

        match write_guard.transactions.get(&transaction_id) {
            None => Err(TransactionNotFound(transaction_id)),
            Some((owner, _)) if *owner != user => Err(AccessDenied(transaction_id)),
            Some(_) => {
                let (_, transaction) = write_guard
                    .transactions
                    .remove(&transaction_id)
                    .expect("entry was just read under the write lock");
                Ok(transaction)
            }
        }
    }
}
