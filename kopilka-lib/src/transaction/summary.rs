use kopilka_repo::transaction_repo::{Transaction, TransactionType};
use rust_decimal::Decimal;
use serde::Serialize;

/// Totals over a filtered transaction set. Accumulation is decimal
/// arithmetic end to end, so currency amounts never drift.
#[derive(Serialize, Clone, PartialEq, Eq, Debug)]
pub struct Summary {
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub balance: Decimal,
}

pub fn summarize<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Summary {
    let mut total_income = Decimal::ZERO;
    let mut total_expense = Decimal::ZERO;
    for transaction in transactions {
        match transaction.transaction_type {
            TransactionType::Income => total_income += transaction.amount,
            TransactionType::Expense => total_expense += transaction.amount,
        }
    }
    Summary {
        total_income,
        total_expense,
        balance: total_income - total_expense,
    }
}
