use actix_multipart::form::tempfile::TempFile;
use actix_multipart::form::text::Text;
use actix_multipart::form::MultipartForm;
use actix_web::http::header::LOCATION;
use actix_web::http::StatusCode;
use actix_web::{get, post, web, HttpResponse, Responder, ResponseError};
use chrono::{Local, NaiveDateTime};
use kopilka_repo::category_repo::Category;
use kopilka_repo::transaction_repo::{
    NewTransaction, Transaction, TransactionRepo, TransactionType, TransactionUpdate,
};
use maud::{html, Markup};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::auth::session::WebUser;
use crate::category::CategoryCache;
use crate::receipt::ReceiptStore;
use crate::transaction::filter::{resolve_filter, FilterParams};
use crate::transaction::summary::{summarize, Summary};
use crate::transaction::{parse_date, DATETIME_FORMAT};
use crate::web::pages::{base, error_banner, navigation};
use crate::web::WebError;

fn type_label(transaction_type: TransactionType) -> &'static str {
    match transaction_type {
        TransactionType::Income => "Доход",
        TransactionType::Expense => "Расход",
    }
}

fn category_name(categories: &[Category], category_id: i32) -> &str {
    categories
        .iter()
        .find(|c| c.id == category_id)
        .map(|c| c.name.as_str())
        .unwrap_or("—")
}

fn see_other(location: String) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((LOCATION, location))
        .finish()
}

const PERIOD_CHOICES: [(&str, &str); 6] = [
    ("today", "сегодня"),
    ("this_week", "за эту неделю"),
    ("this_month", "за этот месяц"),
    ("last_3_months", "за последние 3 месяца"),
    ("this_year", "за этот год"),
    ("all_time", "за все время"),
];

const TYPE_CHOICES: [(&str, &str); 3] =
    [("all", "Все"), ("income", "Доходы"), ("expense", "Расходы")];

fn filter_form(params: &FilterParams, categories: &[Category]) -> Markup {
    let period = params.period.as_deref().unwrap_or("");
    let category_id = params.category_id.as_deref().unwrap_or("");
    let transaction_type = params.transaction_type.as_deref().unwrap_or("");
    html! {
        form method="get" action="/transactions" {
            label { "Период "
                select name="period" {
                    option value="" { "—" }
                    @for (value, label) in PERIOD_CHOICES {
                        option value=(value) selected[period == value] { (label) }
                    }
                }
            }
            label { "Категория "
                select name="category_id" {
                    option value="" { "Все" }
                    @for category in categories {
                        option
                            value=(category.id)
                            selected[category_id == category.id.to_string()] {
                            (category.name)
                        }
                    }
                }
            }
            label { "Тип "
                select name="transaction_type" {
                    option value="" { "—" }
                    @for (value, label) in TYPE_CHOICES {
                        option value=(value) selected[transaction_type == value] { (label) }
                    }
                }
            }
            button type="submit" { "Применить" }
        }
    }
}

fn summary_line(summary: &Summary) -> Markup {
    html! {
        p {
            span class="income" { "Доходы: " (summary.total_income) }
            " • "
            span class="expense" { "Расходы: " (summary.total_expense) }
            " • "
            "Баланс: " (summary.balance)
        }
    }
}

fn list_page(
    params: &FilterParams,
    categories: &[Category],
    transactions: &[Transaction],
    description: &str,
    error: Option<&str>,
) -> Markup {
    base(
        "Транзакции",
        html! {
            (navigation())
            h1 { "Транзакции" }
            (error_banner(error))
            (filter_form(params, categories))
            p { "Применённые фильтры: " (description) }
            (summary_line(&summarize(transactions)))
            table {
                tr {
                    th { "Дата" }
                    th { "Сумма" }
                    th { "Тип" }
                    th { "Категория" }
                    th { "Описание" }
                    th { }
                }
                @for transaction in transactions {
                    tr {
                        td { (transaction.date.format(DATETIME_FORMAT)) }
                        td { (transaction.amount) }
                        td class=(transaction.transaction_type.as_str()) {
                            (type_label(transaction.transaction_type))
                        }
                        td { (category_name(categories, transaction.category_id)) }
                        td { (transaction.description) }
                        td {
                            a href=(format!("/transactions/{}", transaction.id)) { "Открыть" }
                            " "
                            a href=(format!("/transactions/{}/edit", transaction.id)) { "Изменить" }
                            " "
                            a href=(format!("/transactions/{}/delete", transaction.id)) { "Удалить" }
                        }
                    }
                }
            }
        },
    )
}

#[get("")]
pub async fn list_transactions(
    user: WebUser,
    transaction_repo: web::Data<Arc<dyn TransactionRepo>>,
    category_cache: web::Data<CategoryCache>,
    params: web::Query<FilterParams>,
) -> Result<impl Responder, WebError> {
    let params = params.into_inner();
    let categories = category_cache.get().await?;
    let today = Local::now().date_naive();

    let page = match resolve_filter(&params, &categories, today) {
        Ok(resolved) => {
            let transactions = transaction_repo
                .get_all_transactions(user.0, resolved.filter)
                .await?;
            list_page(
                &params,
                &categories,
                &transactions,
                &resolved.description,
                None,
            )
        }
        Err(e) => list_page(&params, &categories, &[], "без фильтров", Some(e.message())),
    };
    Ok(HttpResponse::Ok().body(page.into_string()))
}

#[derive(MultipartForm)]
pub struct TransactionForm {
    pub amount: Text<String>,
    #[multipart(rename = "type")]
    pub transaction_type: Text<String>,
    pub description: Option<Text<String>>,
    pub category_id: Text<i32>,
    pub date: Option<Text<String>>,
    pub receipt_image: Option<TempFile>,
    pub remove_receipt: Option<Text<String>>,
}

struct FormValues {
    amount: String,
    transaction_type: String,
    description: String,
    category_id: Option<i32>,
    date: String,
}

impl FormValues {
    fn empty() -> FormValues {
        FormValues {
            amount: String::new(),
            transaction_type: "expense".to_owned(),
            description: String::new(),
            category_id: None,
            date: Local::now().date_naive().format("%Y-%m-%d").to_string(),
        }
    }

    fn from_transaction(transaction: &Transaction) -> FormValues {
        FormValues {
            amount: transaction.amount.to_string(),
            transaction_type: transaction.transaction_type.as_str().to_owned(),
            description: transaction.description.clone(),
            category_id: Some(transaction.category_id),
            date: transaction.date.format("%Y-%m-%d").to_string(),
        }
    }

    fn from_form(form: &TransactionForm) -> FormValues {
        FormValues {
            amount: form.amount.0.clone(),
            transaction_type: form.transaction_type.0.clone(),
            description: form
                .description
                .as_ref()
                .map(|d| d.0.clone())
                .unwrap_or_default(),
            category_id: Some(form.category_id.0),
            date: form.date.as_ref().map(|d| d.0.clone()).unwrap_or_default(),
        }
    }
}

fn transaction_form_page(
    title: &str,
    action: &str,
    submit_label: &str,
    values: &FormValues,
    categories: &[Category],
    existing_receipt: Option<&str>,
    error: Option<&str>,
) -> Markup {
    base(
        title,
        html! {
            (navigation())
            h1 { (title) }
            (error_banner(error))
            form method="post" action=(action) enctype="multipart/form-data" class="stack" {
                label for="amount" { "Величина" }
                input type="text" name="amount" id="amount" inputmode="decimal"
                    value=(values.amount) required;
                label for="type" { "Тип" }
                select name="type" id="type" {
                    option value="income" selected[values.transaction_type == "income"] { "Доход" }
                    option value="expense" selected[values.transaction_type == "expense"] { "Расход" }
                }
                label for="description" { "Описание" }
                input type="text" name="description" id="description" value=(values.description);
                label for="category_id" { "Категория" }
                select name="category_id" id="category_id" {
                    @for category in categories {
                        option
                            value=(category.id)
                            selected[values.category_id == Some(category.id)] {
                            (category.name)
                        }
                    }
                }
                label for="date" { "Дата" }
                input type="date" name="date" id="date" value=(values.date);
                label for="receipt_image" { "Фото чека (опционально)" }
                input type="file" name="receipt_image" id="receipt_image"
                    accept=".jpg,.jpeg,.png,.gif";
                @if let Some(receipt) = existing_receipt {
                    img class="receipt" src=(format!("/uploads/{}", receipt)) alt="Чек";
                    label {
                        input type="checkbox" name="remove_receipt";
                        " Удалить чек"
                    }
                }
                button type="submit" { (submit_label) }
            }
        },
    )
}

struct ParsedForm {
    amount: Decimal,
    transaction_type: TransactionType,
    description: String,
    category_id: i32,
    date: NaiveDateTime,
}

fn parse_form(form: &TransactionForm, categories: &[Category]) -> Result<ParsedForm, String> {
    let amount = Decimal::from_str(form.amount.trim())
        .map_err(|_| "Неверное значение суммы".to_owned())?;
    if amount < Decimal::ZERO {
        return Err("Сумма не может быть отрицательной".to_owned());
    }
    let transaction_type: TransactionType = form
        .transaction_type
        .parse()
        .map_err(|_| "Тип должен быть income или expense".to_owned())?;
    if !categories.iter().any(|c| c.id == form.category_id.0) {
        return Err("Категория не найдена".to_owned());
    }
    let date = match form.date.as_deref().filter(|d| !d.is_empty()) {
        Some(raw) => parse_date(raw).map_err(|e| e.to_string())?,
        None => Local::now().naive_local(),
    };
    Ok(ParsedForm {
        amount,
        transaction_type,
        description: form
            .description
            .as_ref()
            .map(|d| d.0.clone())
            .unwrap_or_default(),
        category_id: form.category_id.0,
        date,
    })
}

enum UploadOutcome {
    /// `None` when the file input was left empty.
    Stored(Option<String>),
    /// Message to show on the form.
    Rejected(String),
}

/// Persists the uploaded receipt if there is one.
fn save_upload(
    receipt_store: &ReceiptStore,
    upload: Option<&TempFile>,
) -> Result<UploadOutcome, WebError> {
    let upload = match upload {
        Some(upload) if upload.size > 0 => upload,
        _ => return Ok(UploadOutcome::Stored(None)),
    };
    let file_name = match upload.file_name.as_deref().filter(|n| !n.is_empty()) {
        Some(name) => name,
        None => return Ok(UploadOutcome::Stored(None)),
    };
    let data = std::fs::read(upload.file.path()).map_err(|e| WebError::Internal(e.into()))?;
    match receipt_store.save(file_name, &data) {
        Ok(stored) => Ok(UploadOutcome::Stored(Some(stored))),
        Err(e) if e.status_code() == StatusCode::BAD_REQUEST => {
            Ok(UploadOutcome::Rejected(e.message().to_owned()))
        }
        Err(e) => Err(WebError::Internal(anyhow::anyhow!(
            "receipt save failed: {}",
            e.message()
        ))),
    }
}

#[get("/add")]
pub async fn add_transaction_form(
    _user: WebUser,
    category_cache: web::Data<CategoryCache>,
) -> Result<impl Responder, WebError> {
    let categories = category_cache.get().await?;
    let page = transaction_form_page(
        "Новая транзакция",
        "/transactions/add",
        "Создать",
        &FormValues::empty(),
        &categories,
        None,
        None,
    );
    Ok(HttpResponse::Ok().body(page.into_string()))
}

#[post("/add")]
pub async fn add_transaction_submit(
    user: WebUser,
    transaction_repo: web::Data<Arc<dyn TransactionRepo>>,
    category_cache: web::Data<CategoryCache>,
    receipt_store: web::Data<ReceiptStore>,
    form: MultipartForm<TransactionForm>,
) -> Result<impl Responder, WebError> {
    let form = form.into_inner();
    let categories = category_cache.get().await?;
    let render_error = |message: &str| {
        HttpResponse::BadRequest().body(
            transaction_form_page(
                "Новая транзакция",
                "/transactions/add",
                "Создать",
                &FormValues::from_form(&form),
                &categories,
                None,
                Some(message),
            )
            .into_string(),
        )
    };

    let parsed = match parse_form(&form, &categories) {
        Ok(parsed) => parsed,
        Err(message) => return Ok(render_error(&message)),
    };
    let receipt_image = match save_upload(&receipt_store, form.receipt_image.as_ref())? {
        UploadOutcome::Stored(receipt_image) => receipt_image,
        UploadOutcome::Rejected(message) => return Ok(render_error(&message)),
    };

    let created = transaction_repo
        .create_new_transaction(
            user.0,
            NewTransaction {
                amount: parsed.amount,
                transaction_type: parsed.transaction_type,
                description: parsed.description,
                date: parsed.date,
                category_id: parsed.category_id,
                receipt_image: receipt_image.clone(),
            },
        )
        .await;
    let transaction = match created {
        Ok(transaction) => transaction,
        Err(e) => {
            // Do not leave the uploaded file behind when the row was never
            // written.
            if let Some(receipt_image) = &receipt_image {
                receipt_store.delete(receipt_image);
            }
            return Err(e.into());
        }
    };
    info!(transaction_id = transaction.id, "Транзакция создана");

    Ok(see_other("/transactions".to_owned()))
}

#[get("/{transaction_id}")]
pub async fn transaction_detail(
    user: WebUser,
    transaction_repo: web::Data<Arc<dyn TransactionRepo>>,
    category_cache: web::Data<CategoryCache>,
    transaction_id: web::Path<i32>,
) -> Result<impl Responder, WebError> {
    let transaction = transaction_repo
        .get_transaction(user.0, transaction_id.into_inner())
        .await?;
    let categories = category_cache.get().await?;

    let page = base(
        "Транзакция",
        html! {
            (navigation())
            h1 { "Транзакция №" (transaction.id) }
            dl {
                dt { "Сумма" }
                dd { (transaction.amount) }
                dt { "Тип" }
                dd { (type_label(transaction.transaction_type)) }
                dt { "Категория" }
                dd { (category_name(&categories, transaction.category_id)) }
                dt { "Описание" }
                dd { (transaction.description) }
                dt { "Дата" }
                dd { (transaction.date.format(DATETIME_FORMAT)) }
            }
            @if let Some(receipt) = &transaction.receipt_image {
                img class="receipt" src=(format!("/uploads/{}", receipt)) alt="Чек";
            }
            p {
                a href=(format!("/transactions/{}/edit", transaction.id)) { "Изменить" }
                " "
                a href=(format!("/transactions/{}/delete", transaction.id)) { "Удалить" }
            }
        },
    );
    Ok(HttpResponse::Ok().body(page.into_string()))
}

#[get("/{transaction_id}/edit")]
pub async fn edit_transaction_form(
    user: WebUser,
    transaction_repo: web::Data<Arc<dyn TransactionRepo>>,
    category_cache: web::Data<CategoryCache>,
    transaction_id: web::Path<i32>,
) -> Result<impl Responder, WebError> {
    let transaction = transaction_repo
        .get_transaction(user.0, transaction_id.into_inner())
        .await?;
    let categories = category_cache.get().await?;

    let page = transaction_form_page(
        "Изменение транзакции",
        &format!("/transactions/{}/edit", transaction.id),
        "Сохранить",
        &FormValues::from_transaction(&transaction),
        &categories,
        transaction.receipt_image.as_deref(),
        None,
    );
    Ok(HttpResponse::Ok().body(page.into_string()))
}

#[post("/{transaction_id}/edit")]
pub async fn edit_transaction_submit(
    user: WebUser,
    transaction_repo: web::Data<Arc<dyn TransactionRepo>>,
    category_cache: web::Data<CategoryCache>,
    receipt_store: web::Data<ReceiptStore>,
    transaction_id: web::Path<i32>,
    form: MultipartForm<TransactionForm>,
) -> Result<impl Responder, WebError> {
    let transaction_id = transaction_id.into_inner();
    let form = form.into_inner();
    let existing = transaction_repo
        .get_transaction(user.0, transaction_id)
        .await?;
    let categories = category_cache.get().await?;
    let render_error = |message: &str| {
        HttpResponse::BadRequest().body(
            transaction_form_page(
                "Изменение транзакции",
                &format!("/transactions/{}/edit", transaction_id),
                "Сохранить",
                &FormValues::from_form(&form),
                &categories,
                existing.receipt_image.as_deref(),
                Some(message),
            )
            .into_string(),
        )
    };

    let parsed = match parse_form(&form, &categories) {
        Ok(parsed) => parsed,
        Err(message) => return Ok(render_error(&message)),
    };
    let new_receipt = match save_upload(&receipt_store, form.receipt_image.as_ref())? {
        UploadOutcome::Stored(new_receipt) => new_receipt,
        UploadOutcome::Rejected(message) => return Ok(render_error(&message)),
    };

    // A fresh upload wins over the remove checkbox.
    let receipt_update = match (&new_receipt, form.remove_receipt.is_some()) {
        (Some(stored), _) => Some(Some(stored.clone())),
        (None, true) => Some(None),
        (None, false) => None,
    };

    let update = TransactionUpdate {
        amount: Some(parsed.amount),
        transaction_type: Some(parsed.transaction_type),
        description: Some(parsed.description),
        date: Some(parsed.date),
        category_id: Some(parsed.category_id),
        receipt_image: receipt_update.clone(),
    };

    let updated = transaction_repo
        .update_transaction(user.0, transaction_id, update)
        .await;
    match updated {
        Ok(transaction) => {
            // The row now points at the new image; drop the replaced one.
            if receipt_update.is_some() {
                if let Some(old) = &existing.receipt_image {
                    receipt_store.delete(old);
                }
            }
            info!(transaction_id = transaction.id, "Транзакция обновлена");
            Ok(see_other(format!("/transactions/{}", transaction.id)))
        }
        Err(e) => {
            if let Some(new_receipt) = &new_receipt {
                receipt_store.delete(new_receipt);
            }
            Err(e.into())
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct DeleteConfirmForm {
    pub submit_delete: Option<String>,
    pub submit_cancel: Option<String>,
}

#[get("/{transaction_id}/delete")]
pub async fn delete_transaction_form(
    user: WebUser,
    transaction_repo: web::Data<Arc<dyn TransactionRepo>>,
    category_cache: web::Data<CategoryCache>,
    transaction_id: web::Path<i32>,
) -> Result<impl Responder, WebError> {
    let transaction = transaction_repo
        .get_transaction(user.0, transaction_id.into_inner())
        .await?;
    let categories = category_cache.get().await?;

    let page = base(
        "Удаление транзакции",
        html! {
            (navigation())
            h1 { "Удалить транзакцию?" }
            p {
                (transaction.date.format(DATETIME_FORMAT)) ", "
                (transaction.amount) ", "
                (type_label(transaction.transaction_type)) ", "
                (category_name(&categories, transaction.category_id))
            }
            form method="post" action=(format!("/transactions/{}/delete", transaction.id)) {
                button type="submit" name="submit_delete" value="1" { "Удалить" }
                " "
                button type="submit" name="submit_cancel" value="1" { "Отмена" }
            }
        },
    );
    Ok(HttpResponse::Ok().body(page.into_string()))
}

#[post("/{transaction_id}/delete")]
pub async fn delete_transaction_submit(
    user: WebUser,
    transaction_repo: web::Data<Arc<dyn TransactionRepo>>,
    receipt_store: web::Data<ReceiptStore>,
    transaction_id: web::Path<i32>,
    form: web::Form<DeleteConfirmForm>,
) -> Result<impl Responder, WebError> {
    let transaction_id = transaction_id.into_inner();
    if form.submit_delete.is_none() {
        return Ok(see_other(format!("/transactions/{}", transaction_id)));
    }

    let transaction = transaction_repo
        .delete_transaction(user.0, transaction_id)
        .await?;
    info!(transaction_id = transaction.id, "Транзакция удалена");
    if let Some(receipt_image) = &transaction.receipt_image {
        receipt_store.delete(receipt_image);
    }
    Ok(see_other("/transactions".to_owned()))
}
