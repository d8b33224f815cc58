use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use chrono::{Local, Utc};
use kopilka_repo::category_repo::Category;
use kopilka_repo::transaction_repo::{NewTransaction, TransactionRepo, TransactionUpdate};
use kopilka_repo::user_repo::UserId;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::category::CategoryCache;
use crate::error::ApiError;
use crate::receipt::ReceiptStore;
use crate::transaction::filter::FilterParams;
use crate::transaction::{
    parse_date, parse_transaction_type, validate_amount, ApiTransaction, CreateTransactionRequest,
    UpdateTransactionRequest,
};

fn require_category(categories: &[Category], category_id: i32) -> Result<(), ApiError> {
    if categories.iter().any(|c| c.id == category_id) {
        Ok(())
    } else {
        Err(ApiError::validation_with_details(
            "Категория не найдена",
            json!(format!("Получено: {}", category_id)),
        ))
    }
}

#[get("")]
pub async fn get_all_transactions(
    transaction_repo: web::Data<Arc<dyn TransactionRepo>>,
    category_cache: web::Data<CategoryCache>,
    user_id: web::ReqData<UserId>,
    params: web::Query<FilterParams>,
) -> Result<impl Responder, ApiError> {
    let params = params.into_inner();
    let categories = category_cache.get().await?;
    let resolved = super::filter::resolve_filter(&params, &categories, Local::now().date_naive())?;

    let transactions = transaction_repo
        .get_all_transactions(*user_id, resolved.filter)
        .await?;
    let transactions: Vec<ApiTransaction> = transactions
        .into_iter()
        .map(|t| ApiTransaction::from_transaction(t, &categories))
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "count": transactions.len(),
        "transactions": transactions,
    })))
}

#[post("")]
pub async fn create_new_transaction(
    transaction_repo: web::Data<Arc<dyn TransactionRepo>>,
    category_cache: web::Data<CategoryCache>,
    user_id: web::ReqData<UserId>,
    request: web::Json<CreateTransactionRequest>,
) -> Result<impl Responder, ApiError> {
    let request = request.into_inner();

    validate_amount(request.amount)?;
    let transaction_type = parse_transaction_type(&request.transaction_type)?;
    let categories = category_cache.get().await?;
    require_category(&categories, request.category_id)?;
    let date = match &request.date {
        Some(raw) => parse_date(raw)?,
        None => Utc::now().naive_utc(),
    };

    let transaction = transaction_repo
        .create_new_transaction(
            *user_id,
            NewTransaction {
                amount: request.amount,
                transaction_type,
                description: request.description,
                date,
                category_id: request.category_id,
                receipt_image: None,
            },
        )
        .await?;
    info!(transaction_id = transaction.id, "Транзакция создана");

    Ok(HttpResponse::Created().json(json!({
        "message": "Транзакция создана",
        "transaction": ApiTransaction::from_transaction(transaction, &categories),
    })))
}

#[get("/{transaction_id}")]
pub async fn get_transaction(
    transaction_repo: web::Data<Arc<dyn TransactionRepo>>,
    category_cache: web::Data<CategoryCache>,
    user_id: web::ReqData<UserId>,
    transaction_id: web::Path<i32>,
) -> Result<impl Responder, ApiError> {
    let transaction = transaction_repo
        .get_transaction(*user_id, transaction_id.into_inner())
        .await?;
    let categories = category_cache.get().await?;

    Ok(HttpResponse::Ok().json(json!({
        "transaction": ApiTransaction::from_transaction(transaction, &categories),
    })))
}

#[put("/{transaction_id}")]
pub async fn update_transaction(
    transaction_repo: web::Data<Arc<dyn TransactionRepo>>,
    category_cache: web::Data<CategoryCache>,
    user_id: web::ReqData<UserId>,
    transaction_id: web::Path<i32>,
    request: web::Json<UpdateTransactionRequest>,
) -> Result<impl Responder, ApiError> {
    let request = request.into_inner();
    let mut update = TransactionUpdate::default();

    if let Some(amount) = request.amount {
        if amount < rust_decimal::Decimal::ZERO {
            return Err(ApiError::validation_with_details(
                "Сумма не может быть отрицательной",
                json!(format!("Получено {}", amount)),
            ));
        }
        update.amount = Some(amount);
    }
    if let Some(transaction_type) = &request.transaction_type {
        update.transaction_type = Some(parse_transaction_type(transaction_type)?);
    }
    update.description = request.description;
    if let Some(raw_date) = &request.date {
        update.date = Some(parse_date(raw_date)?);
    }
    let categories = category_cache.get().await?;
    if let Some(category_id) = request.category_id {
        require_category(&categories, category_id)?;
        update.category_id = Some(category_id);
    }

    let transaction = transaction_repo
        .update_transaction(*user_id, transaction_id.into_inner(), update)
        .await?;
    info!(transaction_id = transaction.id, "Транзакция обновлена");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Обновлено",
        "transaction": ApiTransaction::from_transaction(transaction, &categories),
    })))
}

#[delete("/{transaction_id}")]
pub async fn delete_transaction(
    transaction_repo: web::Data<Arc<dyn TransactionRepo>>,
    receipt_store: web::Data<ReceiptStore>,
    user_id: web::ReqData<UserId>,
    transaction_id: web::Path<i32>,
) -> Result<impl Responder, ApiError> {
    let transaction = transaction_repo
        .delete_transaction(*user_id, transaction_id.into_inner())
        .await?;
    info!(transaction_id = transaction.id, "Транзакция удалена");

    // The DB row is gone already; image cleanup is best-effort and any
    // leftover file is only logged.
    if let Some(receipt_image) = &transaction.receipt_image {
        receipt_store.delete(receipt_image);
    }

    Ok(HttpResponse::NoContent().finish())
}
