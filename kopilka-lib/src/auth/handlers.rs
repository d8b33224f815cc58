use crate::auth::jwt::JWTAuth;
use crate::auth::{password, refresh_validator};
use crate::error::ApiError;
use actix_web::{post, web, HttpRequest, HttpResponse, Responder, Scope};
use actix_web_httpauth::middleware::HttpAuthentication;
use kopilka_repo::user_repo::{UserId, UserRepo, UserRepoError};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

pub fn auth_service() -> Scope {
    let refresh_auth = HttpAuthentication::bearer(refresh_validator);
    web::scope("/auth").service(login).service(
        web::scope("")
            .wrap(refresh_auth)
            .service(refresh)
            .service(logout),
    )
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[post("/login")]
async fn login(
    user_repo: web::Data<Arc<dyn UserRepo>>,
    credentials: web::Json<LoginRequest>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let credentials = credentials.into_inner();

    let user = match user_repo.get_user_by_username(&credentials.username).await {
        Ok(user) => user,
        Err(UserRepoError::UserNotFound(_)) => {
            warn!(username = %credentials.username, "Login attempt for unknown user");
            return Err(ApiError::unauthorized("Неверные данные"));
        }
        Err(e) => return Err(e.into()),
    };

    let matched = password::verify_password(&credentials.password, &user.password_hash)
        .map_err(|e| ApiError::internal(anyhow::Error::new(e)))?;
    if !matched {
        warn!(user_id = user.id, "Failed login attempt");
        return Err(ApiError::unauthorized("Неверные данные"));
    }

    let jwt_auth = req.app_data::<JWTAuth>().unwrap();
    info!(user_id = user.id, "Successful login");
    Ok(HttpResponse::Ok().json(json!({
        "access_token": jwt_auth.create_access_token(user.id),
        "refresh_token": jwt_auth.create_refresh_token(user.id),
        "user_id": user.id,
        "username": user.username,
    })))
}

#[post("/refresh")]
async fn refresh(user_id: web::ReqData<UserId>, req: HttpRequest) -> impl Responder {
    let jwt_auth = req.app_data::<JWTAuth>().unwrap();
    let user_id = user_id.into_inner();
    info!(user_id, "Access token refreshed");
    HttpResponse::Ok().json(json!({
        "access_token": jwt_auth.create_access_token(user_id),
    }))
}

#[post("/logout")]
async fn logout(user_id: web::ReqData<UserId>) -> impl Responder {
    // tokens are stateless, the client is asked to drop them
    info!(user_id = user_id.into_inner(), "Logout");
    HttpResponse::Ok().json(json!({
        "message": "Успешный выход. Удалите токены на клиенте.",
        "note": "Access токен истечет через 15 мин, refresh через 7 дней",
    }))
}
