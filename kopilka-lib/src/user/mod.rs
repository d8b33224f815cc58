use actix_web::{get, put, web, HttpResponse, Responder, Scope};
use kopilka_repo::user_repo::{User, UserId, UserRepo};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::auth::password::{encode_password, verify_password};
use crate::error::ApiError;
use crate::transaction::DATETIME_FORMAT;

pub fn user_service() -> Scope {
    web::scope("/profile")
        .service(get_profile)
        .service(update_profile)
        .service(change_password)
}

pub fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.chars().count() < 3 {
        return Err(ApiError::validation(
            "Имя пользователя должно быть не короче 3 символов",
        ));
    }
    if username.chars().count() > 20 {
        return Err(ApiError::validation(
            "Имя пользователя должно быть не длиннее 20 символов",
        ));
    }
    if !username.chars().all(char::is_alphanumeric) {
        return Err(ApiError::validation(
            "Имя должно содержать только буквы и цифры",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if !is_valid_email(email) {
        return Err(ApiError::validation("Неверный формат email"));
    }
    Ok(())
}

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Password policy applied on change and on signup.
pub fn validate_new_password(
    new_password: &str,
    current_password: Option<&str>,
    username: &str,
    email: &str,
) -> Result<(), ApiError> {
    if new_password.chars().count() < 6 {
        return Err(ApiError::validation(
            "Новый пароль должен содержать минимум 6 символов",
        ));
    }
    if current_password == Some(new_password) {
        return Err(ApiError::validation(
            "Новый пароль не должен совпадать с текущим",
        ));
    }
    if !new_password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ApiError::validation(
            "Пароль должен содержать хотя бы одну цифру",
        ));
    }
    let lowered = new_password.to_lowercase();
    if lowered == username.to_lowercase() || lowered == email.to_lowercase() {
        return Err(ApiError::validation(
            "Пароль не должен содержать имя пользователя или email",
        ));
    }
    Ok(())
}

fn user_json(user: &User) -> Value {
    json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
        "created_at": user.created_at.format(DATETIME_FORMAT).to_string(),
    })
}

#[derive(Deserialize, Clone, Debug)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[get("")]
pub async fn get_profile(
    user_repo: web::Data<Arc<dyn UserRepo>>,
    user_id: web::ReqData<UserId>,
) -> Result<impl Responder, ApiError> {
    let user = user_repo.get_user(*user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "user": user_json(&user) })))
}

#[put("")]
pub async fn update_profile(
    user_repo: web::Data<Arc<dyn UserRepo>>,
    user_id: web::ReqData<UserId>,
    request: web::Json<UpdateProfileRequest>,
) -> Result<impl Responder, ApiError> {
    let request = request.into_inner();
    if let Some(username) = &request.username {
        validate_username(username)?;
    }
    if let Some(email) = &request.email {
        validate_email(email)?;
    }

    let user = user_repo
        .update_profile(*user_id, request.username, request.email)
        .await?;
    info!(user_id = user.id, "Профиль обновлен");
    Ok(HttpResponse::Ok().json(json!({ "user": user_json(&user) })))
}

#[put("/password")]
pub async fn change_password(
    user_repo: web::Data<Arc<dyn UserRepo>>,
    user_id: web::ReqData<UserId>,
    request: web::Json<ChangePasswordRequest>,
) -> Result<impl Responder, ApiError> {
    let request = request.into_inner();
    let user = user_repo.get_user(*user_id).await?;

    let current_matches = verify_password(&request.current_password, &user.password_hash)
        .map_err(|e| ApiError::internal(e.into()))?;
    if !current_matches {
        return Err(ApiError::unauthorized("Неверный пароль"));
    }
    validate_new_password(
        &request.new_password,
        Some(&request.current_password),
        &user.username,
        &user.email,
    )?;

    let password_hash =
        encode_password(&request.new_password).map_err(|e| ApiError::internal(e.into()))?;
    user_repo
        .update_password_hash(*user_id, &password_hash)
        .await?;
    info!(user_id = user.id, "Пароль изменен");

    Ok(HttpResponse::Ok().json(json!({ "message": "Пароль успешно изменен" })))
}
