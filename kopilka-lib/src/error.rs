use actix_web::body::BoxBody;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use kopilka_repo::category_repo::CategoryRepoError;
use kopilka_repo::transaction_repo::TransactionRepoError;
use kopilka_repo::user_repo::UserRepoError;
use serde_json::{json, Value};
use std::fmt::{Debug, Display, Formatter};
use tracing::error;

/// API error carrying the uniform envelope
/// `{"error": {"code": int, "message": str, "details": object}}`.
/// The HTTP status mirrors `code`.
pub struct ApiError {
    code: StatusCode,
    message: String,
    details: Value,
}

impl ApiError {
    pub fn new(code: StatusCode, message: impl Into<String>, details: Value) -> ApiError {
        ApiError {
            code,
            message: message.into(),
            details,
        }
    }

    pub fn validation(message: impl Into<String>) -> ApiError {
        Self::new(StatusCode::BAD_REQUEST, message, json!({}))
    }

    pub fn validation_with_details(message: impl Into<String>, details: Value) -> ApiError {
        Self::new(StatusCode::BAD_REQUEST, message, details)
    }

    pub fn unauthorized(message: impl Into<String>) -> ApiError {
        Self::new(StatusCode::UNAUTHORIZED, message, json!({}))
    }

    pub fn forbidden(message: impl Into<String>) -> ApiError {
        Self::new(StatusCode::FORBIDDEN, message, json!({}))
    }

    pub fn not_found(message: impl Into<String>) -> ApiError {
        Self::new(StatusCode::NOT_FOUND, message, json!({}))
    }

    pub fn conflict(message: impl Into<String>) -> ApiError {
        Self::new(StatusCode::CONFLICT, message, json!({}))
    }

    pub fn internal(cause: anyhow::Error) -> ApiError {
        error!(%cause, "Internal error");
        // exception text is exposed in details on the API surface,
        // matching the original behaviour
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Ошибка базы данных",
            json!(format!("{:#}", cause)),
        )
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn envelope(&self) -> Value {
        json!({
            "error": {
                "code": self.code.as_u16(),
                "message": self.message,
                "details": self.details,
            }
        })
    }
}

impl Debug for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("ApiError({}, {})", self.code, self.message))
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}: {}", self.code, self.message))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.code
    }

    fn error_response(&self) -> HttpResponse<BoxBody> {
        HttpResponse::build(self.code).json(self.envelope())
    }
}

impl From<TransactionRepoError> for ApiError {
    fn from(e: TransactionRepoError) -> Self {
        match e {
            TransactionRepoError::TransactionNotFound(_) => {
                ApiError::not_found("Транзакция не найдена")
            }
            TransactionRepoError::AccessDenied(_) => {
                ApiError::forbidden("У вас недостаточно прав")
            }
            TransactionRepoError::Other(cause) => ApiError::internal(cause),
        }
    }
}

impl From<UserRepoError> for ApiError {
    fn from(e: UserRepoError) -> Self {
        match e {
            UserRepoError::UserNotFound(_) => ApiError::not_found("Пользователь не найден"),
            UserRepoError::UsernameTaken(_) => ApiError::conflict("Данное имя уже занято"),
            UserRepoError::EmailTaken(_) => ApiError::conflict("Данная почта уже занята"),
            UserRepoError::Other(cause) => ApiError::internal(cause),
        }
    }
}

impl From<CategoryRepoError> for ApiError {
    fn from(e: CategoryRepoError) -> Self {
        match e {
            CategoryRepoError::CategoryNotFound(_) => {
                ApiError::validation("Категория не найдена")
            }
            CategoryRepoError::CategoryExists(_) => {
                ApiError::conflict("Категория уже существует")
            }
            CategoryRepoError::Other(cause) => ApiError::internal(cause),
        }
    }
}
