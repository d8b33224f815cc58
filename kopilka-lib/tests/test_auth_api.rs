extern crate futures_util;
extern crate rstest;
extern crate serde_json;

use actix_web::http::StatusCode;
use actix_web::test;
use actix_web::test::TestRequest;
use actix_web::web::Data;
use actix_web::App;
use actix_web_httpauth::middleware::HttpAuthentication;
use rstest::rstest;
use serde_json::{json, Value};

use kopilka_lib::auth;
use kopilka_lib::auth::jwt::JWTAuth;
use utils::repos;
use utils::tracing_setup;
use utils::Repos;
use utils::TestUser;

#[macro_use]
mod utils;

fn jwt_auth() -> JWTAuth {
    JWTAuth::from_secret(b"test-secret".to_vec())
}

macro_rules! build_auth_app {
    ($repos:ident, $jwt_auth:expr) => {{
        let (transaction_repo, _, user_repo) = $repos.clone();
        let _ = transaction_repo;
        App::new()
            .app_data($jwt_auth)
            .app_data(Data::new(user_repo))
            .wrap(kopilka_lib::tracing::create_middleware())
            .service(auth::handlers::auth_service())
            .service(
                actix_web::web::scope("/api")
                    .wrap(HttpAuthentication::bearer(auth::credentials_validator))
                    .service(kopilka_lib::user::user_service()),
            )
    }};
}

#[rstest]
#[actix_rt::test]
async fn test_login_returns_token_pair(_tracing_setup: &(), repos: Repos) {
    let (_, _, user_repo) = &repos;
    let test_user = TestUser::new(user_repo.clone()).await;
    let service = test::init_service(build_auth_app!(repos, jwt_auth())).await;

    let request = TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({
            "username": test_user.username,
            "password": test_user.password,
        }))
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["user_id"], test_user.user_id);
    assert_eq!(body["username"], test_user.username.as_str());
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());

    // the access token opens the API
    let access_token = body["access_token"].as_str().unwrap().to_owned();
    let request = TestRequest::get()
        .uri("/api/profile")
        .insert_header(("Authorization", format!("Bearer {}", access_token)))
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["user"]["username"], test_user.username.as_str());
}

#[rstest]
#[actix_rt::test]
async fn test_login_rejects_bad_credentials(_tracing_setup: &(), repos: Repos) {
    let (_, _, user_repo) = &repos;
    let test_user = TestUser::new(user_repo.clone()).await;
    let service = test::init_service(build_auth_app!(repos, jwt_auth())).await;

    for credentials in [
        json!({ "username": test_user.username, "password": "wrong" }),
        json!({ "username": "nobody", "password": test_user.password }),
    ] {
        let request = TestRequest::post()
            .uri("/auth/login")
            .set_json(credentials)
            .to_request();
        let response = test::call_service(&service, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["error"]["message"], "Неверные данные");
    }
}

#[rstest]
#[actix_rt::test]
async fn test_refresh_flow(_tracing_setup: &(), repos: Repos) {
    let (_, _, user_repo) = &repos;
    let test_user = TestUser::new(user_repo.clone()).await;
    let auth_keys = jwt_auth();
    let refresh_token = auth_keys.create_refresh_token(test_user.user_id);
    let access_token = auth_keys.create_access_token(test_user.user_id);
    let service = test::init_service(build_auth_app!(repos, auth_keys)).await;

    let request = TestRequest::post()
        .uri("/auth/refresh")
        .insert_header(("Authorization", format!("Bearer {}", refresh_token)))
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = test::read_body_json(response).await;
    assert!(body["access_token"].is_string());

    // an access token is not accepted on the refresh endpoint
    let request = TestRequest::post()
        .uri("/auth/refresh")
        .insert_header(("Authorization", format!("Bearer {}", access_token)))
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // and a refresh token is not accepted on the API
    let request = TestRequest::get()
        .uri("/api/profile")
        .insert_header(("Authorization", format!("Bearer {}", refresh_token)))
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[rstest]
#[actix_rt::test]
async fn test_logout_is_advisory(_tracing_setup: &(), repos: Repos) {
    let (_, _, user_repo) = &repos;
    let test_user = TestUser::new(user_repo.clone()).await;
    let auth_keys = jwt_auth();
    let refresh_token = auth_keys.create_refresh_token(test_user.user_id);
    let service = test::init_service(build_auth_app!(repos, auth_keys)).await;

    let request = TestRequest::post()
        .uri("/auth/logout")
        .insert_header(("Authorization", format!("Bearer {}", refresh_token)))
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["message"], "Успешный выход. Удалите токены на клиенте.");
}
