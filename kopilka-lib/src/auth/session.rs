use actix_web::body::BoxBody;
use actix_web::cookie::time::Duration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::http::{header, StatusCode};
use actix_web::{FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError};
use kopilka_repo::user_repo::UserId;
use std::fmt::{Display, Formatter};
use std::future::{ready, Ready};
use tracing_actix_web::RootSpan;

use super::jwt::{JWTAuth, TokenKind};

pub const SESSION_COOKIE: &str = "kopilka_session";
pub const LOGIN_PATH: &str = "/auth/login";

/// Builds the auth cookie for the web surface. With `remember` set the
/// cookie (and the token inside it) outlives the browser session.
pub fn session_cookie(jwt_auth: &JWTAuth, user_id: UserId, remember: bool) -> Cookie<'static> {
    let token = jwt_auth.create_session_token(user_id, remember);
    let mut cookie = Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .finish();
    if remember {
        cookie.set_max_age(Duration::days(30));
    }
    cookie
}

pub fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .finish();
    cookie.make_removal();
    cookie
}

/// The authenticated principal of a web request. Handlers take it as an
/// explicit argument; an invalid or missing session cookie redirects the
/// browser to the login page.
#[derive(Clone, Copy, Debug)]
pub struct WebUser(pub UserId);

#[derive(Debug)]
pub struct LoginRedirect;

impl Display for LoginRedirect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Redirecting to login")
    }
}

impl ResponseError for LoginRedirect {
    fn status_code(&self) -> StatusCode {
        StatusCode::SEE_OTHER
    }

    fn error_response(&self) -> HttpResponse<BoxBody> {
        HttpResponse::SeeOther()
            .insert_header((header::LOCATION, LOGIN_PATH))
            .finish()
    }
}

impl FromRequest for WebUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract_web_user(req))
    }
}

fn extract_web_user(req: &HttpRequest) -> Result<WebUser, actix_web::Error> {
    let jwt_auth = req
        .app_data::<JWTAuth>()
        .expect("JWTAuth should be registered as app data");
    let cookie = req.cookie(SESSION_COOKIE).ok_or(LoginRedirect)?;
    let user_id = jwt_auth
        .validate_token(cookie.value(), TokenKind::Session)
        .map_err(|_| LoginRedirect)?;

    if let Some(root_span) = req.extensions().get::<RootSpan>() {
        root_span.record("user_id", user_id);
    }
    Ok(WebUser(user_id))
}
