use actix_web::http::header::LOCATION;
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use kopilka_repo::user_repo::{NewUser, UserRepo, UserRepoError};
use maud::{html, Markup};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::auth::jwt::JWTAuth;
use crate::auth::password::{encode_password, verify_password};
use crate::auth::session::{clear_session_cookie, session_cookie};
use crate::config::Config;
use crate::error::ApiError;
use crate::user::{validate_email, validate_new_password, validate_username};
use crate::web::pages::{base, error_banner};
use crate::web::WebError;

#[derive(Deserialize, Clone, Debug)]
pub struct LoginForm {
    /// Username or email, the original form calls it `valid_data`.
    pub valid_data: String,
    pub password: String,
    pub remember: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

fn login_page(error: Option<&str>) -> Markup {
    base(
        "Вход",
        html! {
            h1 { "Вход" }
            (error_banner(error))
            form method="post" action="/auth/login" class="stack" {
                label for="valid_data" { "Имя или почта" }
                input type="text" name="valid_data" id="valid_data" required;
                label for="password" { "Пароль" }
                input type="password" name="password" id="password" required;
                label {
                    input type="checkbox" name="remember";
                    " Запомнить меня"
                }
                button type="submit" { "Войти" }
            }
            p { "Нет аккаунта? " a href="/auth/register" { "Зарегистрироваться" } }
        },
    )
}

fn register_page(error: Option<&str>) -> Markup {
    base(
        "Регистрация",
        html! {
            h1 { "Регистрация" }
            (error_banner(error))
            form method="post" action="/auth/register" class="stack" {
                label for="username" { "Имя" }
                input type="text" name="username" id="username" required;
                label for="email" { "Почта" }
                input type="email" name="email" id="email" required;
                label for="password" { "Пароль" }
                input type="password" name="password" id="password" required;
                label for="confirm_password" { "Подтвердите пароль" }
                input type="password" name="confirm_password" id="confirm_password" required;
                button type="submit" { "Зарегистрироваться" }
            }
            p { "Уже есть аккаунт? " a href="/auth/login" { "Войти" } }
        },
    )
}

fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((LOCATION, location))
        .finish()
}

#[get("/login")]
pub async fn login_form() -> impl Responder {
    HttpResponse::Ok().body(login_page(None).into_string())
}

#[post("/login")]
pub async fn login_submit(
    req: HttpRequest,
    user_repo: web::Data<Arc<dyn UserRepo>>,
    form: web::Form<LoginForm>,
) -> Result<impl Responder, WebError> {
    let jwt_auth = req
        .app_data::<JWTAuth>()
        .expect("JWTAuth should be registered as app data");
    let form = form.into_inner();

    let user = match user_repo.get_user_by_username(&form.valid_data).await {
        Ok(user) => Ok(user),
        Err(UserRepoError::UserNotFound(_)) => {
            user_repo.get_user_by_email(&form.valid_data).await
        }
        Err(e) => Err(e),
    };
    let user = match user {
        Ok(user) => user,
        Err(UserRepoError::UserNotFound(_)) => {
            return Ok(HttpResponse::Unauthorized()
                .body(login_page(Some("Неверные данные")).into_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let password_matches = verify_password(&form.password, &user.password_hash)
        .map_err(|e| WebError::Internal(e.into()))?;
    if !password_matches {
        return Ok(
            HttpResponse::Unauthorized().body(login_page(Some("Неверные данные")).into_string())
        );
    }

    let remember = form.remember.is_some();
    info!(user_id = user.id, remember, "Пользователь вошел через веб");
    let cookie = session_cookie(jwt_auth, user.id, remember);
    Ok(HttpResponse::SeeOther()
        .insert_header((LOCATION, "/transactions"))
        .cookie(cookie)
        .finish())
}

#[get("/register")]
pub async fn register_form(config: web::Data<Config>) -> impl Responder {
    if !config.signups_enabled {
        return HttpResponse::Forbidden()
            .body(register_page(Some("Регистрация отключена")).into_string());
    }
    HttpResponse::Ok().body(register_page(None).into_string())
}

#[post("/register")]
pub async fn register_submit(
    user_repo: web::Data<Arc<dyn UserRepo>>,
    config: web::Data<Config>,
    form: web::Form<RegisterForm>,
) -> Result<impl Responder, WebError> {
    if !config.signups_enabled {
        return Ok(HttpResponse::Forbidden()
            .body(register_page(Some("Регистрация отключена")).into_string()));
    }
    let form = form.into_inner();

    let validation = validate_username(&form.username)
        .and_then(|_| validate_email(&form.email))
        .and_then(|_| validate_new_password(&form.password, None, &form.username, &form.email))
        .and_then(|_| {
            if form.password == form.confirm_password {
                Ok(())
            } else {
                Err(ApiError::validation("Пароли должны совпадать"))
            }
        });
    if let Err(e) = validation {
        return Ok(
            HttpResponse::BadRequest().body(register_page(Some(e.message())).into_string())
        );
    }

    let password_hash =
        encode_password(&form.password).map_err(|e| WebError::Internal(e.into()))?;
    let created = user_repo
        .create_user(NewUser {
            username: form.username,
            email: form.email,
            password_hash,
        })
        .await;
    match created {
        Ok(user) => {
            info!(user_id = user.id, "Пользователь зарегистрирован");
            Ok(see_other("/auth/login"))
        }
        Err(UserRepoError::UsernameTaken(_)) => Ok(HttpResponse::Conflict()
            .body(register_page(Some("Данное имя уже занято")).into_string())),
        Err(UserRepoError::EmailTaken(_)) => Ok(HttpResponse::Conflict()
            .body(register_page(Some("Данная почта уже занята")).into_string())),
        Err(e) => Err(e.into()),
    }
}

#[post("/logout")]
pub async fn logout() -> impl Responder {
    HttpResponse::SeeOther()
        .insert_header((LOCATION, "/auth/login"))
        .cookie(clear_session_cookie())
        .finish()
}
