use actix_web::body::BoxBody;
use actix_web::http::header::LOCATION;
use actix_web::http::StatusCode;
use actix_web::{get, web, HttpResponse, ResponseError, Scope};
use kopilka_repo::category_repo::CategoryRepoError;
use kopilka_repo::transaction_repo::TransactionRepoError;
use kopilka_repo::user_repo::UserRepoError;
use maud::html;
use std::fmt::{Debug, Display, Formatter};
use tracing::error;

mod auth;
mod pages;
mod transactions;

/// Server-rendered pages. API errors stay JSON, these routes answer with
/// HTML and redirects.
pub fn web_service() -> Scope {
    web::scope("")
        .service(index)
        .service(
            web::scope("/auth")
                .service(auth::login_form)
                .service(auth::login_submit)
                .service(auth::register_form)
                .service(auth::register_submit)
                .service(auth::logout),
        )
        .service(
            web::scope("/transactions")
                .service(transactions::list_transactions)
                .service(transactions::add_transaction_form)
                .service(transactions::add_transaction_submit)
                .service(transactions::transaction_detail)
                .service(transactions::edit_transaction_form)
                .service(transactions::edit_transaction_submit)
                .service(transactions::delete_transaction_form)
                .service(transactions::delete_transaction_submit),
        )
}

#[get("/")]
pub async fn index() -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((LOCATION, "/transactions"))
        .finish()
}

/// Error type of the HTML surface. The user sees a short Russian message,
/// the cause goes to the log.
pub enum WebError {
    NotFound(&'static str),
    Forbidden,
    Internal(anyhow::Error),
}

impl WebError {
    fn message(&self) -> &str {
        match self {
            WebError::NotFound(message) => message,
            WebError::Forbidden => "У вас недостаточно прав",
            WebError::Internal(_) => "Ошибка сервера",
        }
    }
}

impl Debug for WebError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WebError::Internal(cause) => write!(f, "WebError::Internal({:?})", cause),
            other => f.write_str(other.message()),
        }
    }
}

impl Display for WebError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl ResponseError for WebError {
    fn status_code(&self) -> StatusCode {
        match self {
            WebError::NotFound(_) => StatusCode::NOT_FOUND,
            WebError::Forbidden => StatusCode::FORBIDDEN,
            WebError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse<BoxBody> {
        if let WebError::Internal(cause) = self {
            error!(%cause, "Internal error");
        }
        let page = pages::base(
            "Ошибка",
            html! {
                h1 { (self.message()) }
                p { a href="/transactions" { "К списку транзакций" } }
            },
        );
        HttpResponse::build(self.status_code()).body(page.into_string())
    }
}

impl From<TransactionRepoError> for WebError {
    fn from(e: TransactionRepoError) -> WebError {
        match e {
            TransactionRepoError::TransactionNotFound(_) => {
                WebError::NotFound("Транзакция не найдена")
            }
            TransactionRepoError::AccessDenied(_) => WebError::Forbidden,
            TransactionRepoError::Other(cause) => WebError::Internal(cause),
        }
    }
}

impl From<CategoryRepoError> for WebError {
    fn from(e: CategoryRepoError) -> WebError {
        match e {
            CategoryRepoError::CategoryNotFound(_) => WebError::NotFound("Категория не найдена"),
            CategoryRepoError::CategoryExists(name) => {
                WebError::Internal(anyhow::anyhow!("duplicate category {}", name))
            }
            CategoryRepoError::Other(cause) => WebError::Internal(cause),
        }
    }
}

impl From<UserRepoError> for WebError {
    fn from(e: UserRepoError) -> WebError {
        match e {
            UserRepoError::UserNotFound(_) => WebError::NotFound("Пользователь не найден"),
            UserRepoError::UsernameTaken(name) => {
                WebError::Internal(anyhow::anyhow!("username {} taken", name))
            }
            UserRepoError::EmailTaken(email) => {
                WebError::Internal(anyhow::anyhow!("email {} taken", email))
            }
            UserRepoError::Other(cause) => WebError::Internal(cause),
        }
    }
}
