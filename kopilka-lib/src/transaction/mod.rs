use actix_web::{web, Scope};
use chrono::{NaiveDate, NaiveDateTime};
use kopilka_repo::category_repo::Category;
use kopilka_repo::transaction_repo::{Transaction, TransactionType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ApiError;

pub mod filter;
mod handlers;
pub mod summary;

pub fn transaction_service() -> Scope {
    web::scope("/transactions")
        .service(handlers::get_all_transactions)
        .service(handlers::create_new_transaction)
        .service(handlers::get_transaction)
        .service(handlers::update_transaction)
        .service(handlers::delete_transaction)
}

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug)]
#[error("Неверный формат даты: {0}")]
pub struct InvalidDate(pub String);

/// Parses textual dates the way the forms and the API accept them:
/// `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, `DD.MM.YYYY`, tried in that order.
pub fn parse_date(s: &str) -> Result<NaiveDateTime, InvalidDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap());
    }
    if let Ok(date_time) = NaiveDateTime::parse_from_str(s, DATETIME_FORMAT) {
        return Ok(date_time);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%d.%m.%Y") {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap());
    }
    Err(InvalidDate(s.to_owned()))
}

impl From<InvalidDate> for ApiError {
    fn from(e: InvalidDate) -> ApiError {
        ApiError::validation(e.to_string())
    }
}

pub fn validate_amount(amount: Decimal) -> Result<(), ApiError> {
    if amount < Decimal::ZERO {
        return Err(ApiError::validation_with_details(
            "Поле amount не может быть отрицательным",
            serde_json::json!(format!("Получено: {}", amount)),
        ));
    }
    Ok(())
}

pub fn parse_transaction_type(s: &str) -> Result<TransactionType, ApiError> {
    s.parse().map_err(|_| {
        ApiError::validation_with_details(
            "Тип должен быть income или expense",
            serde_json::json!(format!("Получен {}", s)),
        )
    })
}

mod datetime_format {
    use super::DATETIME_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        date: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(DATETIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Wire shape of a transaction on the JSON API.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct ApiTransaction {
    pub id: i32,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub description: String,
    #[serde(with = "datetime_format")]
    pub date: NaiveDateTime,
    pub category: Option<String>,
    pub receipt_image: Option<String>,
}

impl ApiTransaction {
    pub fn from_transaction(transaction: Transaction, categories: &[Category]) -> ApiTransaction {
        let category = categories
            .iter()
            .find(|c| c.id == transaction.category_id)
            .map(|c| c.name.clone());
        ApiTransaction {
            id: transaction.id,
            amount: transaction.amount,
            transaction_type: transaction.transaction_type,
            description: transaction.description,
            date: transaction.date,
            category,
            receipt_image: transaction.receipt_image,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateTransactionRequest {
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub description: String,
    pub category_id: i32,
    pub date: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug)]
pub struct UpdateTransactionRequest {
    pub amount: Option<Decimal>,
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub date: Option<String>,
}
