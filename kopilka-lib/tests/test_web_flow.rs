extern crate futures_util;
extern crate rstest;
extern crate serde_json;

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::header::LOCATION;
use actix_web::http::StatusCode;
use actix_web::test;
use actix_web::test::TestRequest;
use actix_web::web::Data;
use actix_web::App;
use async_trait::async_trait;
use rstest::rstest;
use std::sync::Arc;

use kopilka_repo::transaction_repo::{
    Filter, NewTransaction, Transaction, TransactionRepo, TransactionRepoError, TransactionUpdate,
};
use kopilka_repo::user_repo::UserId;

use kopilka_lib::auth::jwt::JWTAuth;
use kopilka_lib::config::Config;
use utils::receipt_store;
use utils::repos;
use utils::seed_category;
use utils::tracing_setup;
use utils::Repos;
use utils::TestUser;

#[macro_use]
mod utils;

fn test_config(upload_dir: std::path::PathBuf) -> Config {
    Config {
        database_url: String::new(),
        upload_dir,
        signups_enabled: true,
        category_cache_ttl_secs: 300,
        ssl: None,
    }
}

macro_rules! build_web_app {
    ($repos:ident, $receipt_store:expr, $config:expr) => {{
        let (transaction_repo, category_repo, user_repo) = $repos.clone();
        let category_cache = Data::new(kopilka_lib::category::CategoryCache::new(
            category_repo,
            std::time::Duration::from_secs(300),
        ));
        App::new()
            .app_data(JWTAuth::from_secret(b"test-secret".to_vec()))
            .app_data(Data::new(transaction_repo))
            .app_data(Data::new(user_repo))
            .app_data(category_cache)
            .app_data(Data::new($receipt_store))
            .app_data(Data::new($config))
            .wrap(kopilka_lib::tracing::create_middleware())
            .service(kopilka_lib::web::web_service())
    }};
}

fn session_cookie_from<B>(response: &ServiceResponse<B>) -> Cookie<'static> {
    response
        .response()
        .cookies()
        .find(|c| c.name() == "kopilka_session")
        .expect("session cookie set")
        .into_owned()
}

async fn body_text<B>(response: ServiceResponse<B>) -> String
where
    B: actix_web::body::MessageBody,
    B::Error: std::fmt::Debug,
{
    let body = test::read_body(response).await;
    String::from_utf8(body.to_vec()).unwrap()
}

#[rstest]
#[actix_rt::test]
async fn test_unauthenticated_is_redirected_to_login(_tracing_setup: &(), repos: Repos) {
    let (dir, store) = receipt_store();
    let config = test_config(dir.path().to_path_buf());
    let service = test::init_service(build_web_app!(repos, store, config)).await;

    let request = TestRequest::get().uri("/transactions").to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(LOCATION).unwrap(), "/auth/login");
}

#[rstest]
#[actix_rt::test]
async fn test_register_login_and_filtered_list(_tracing_setup: &(), repos: Repos) {
    let (transaction_repo, category_repo, _) = &repos;
    let food = seed_category(category_repo, "Еда").await;
    let (dir, store) = receipt_store();
    let config = test_config(dir.path().to_path_buf());
    let service = test::init_service(build_web_app!(repos, store, config)).await;

    let request = TestRequest::post()
        .uri("/auth/register")
        .set_form(&[
            ("username", "masha"),
            ("email", "masha@example.com"),
            ("password", "parol7x"),
            ("confirm_password", "parol7x"),
        ])
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(LOCATION).unwrap(), "/auth/login");

    // wrong password shows the form again
    let request = TestRequest::post()
        .uri("/auth/login")
        .set_form(&[("valid_data", "masha"), ("password", "wrong")])
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(response).await.contains("Неверные данные"));

    // login by email works too
    let request = TestRequest::post()
        .uri("/auth/login")
        .set_form(&[
            ("valid_data", "masha@example.com"),
            ("password", "parol7x"),
            ("remember", "on"),
        ])
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(LOCATION).unwrap(), "/transactions");
    let session = session_cookie_from(&response);

    let masha = repos.2.get_user_by_username("masha").await.unwrap();
    for (transaction_type, amount) in [("income", "1000"), ("expense", "250.50")] {
        transaction_repo
            .create_new_transaction(
                masha.id,
                kopilka_repo::transaction_repo::NewTransaction {
                    amount: amount.parse().unwrap(),
                    transaction_type: transaction_type.parse().unwrap(),
                    description: "тест".to_owned(),
                    date: chrono::NaiveDate::from_ymd_opt(2024, 3, 5)
                        .unwrap()
                        .and_hms_opt(12, 0, 0)
                        .unwrap(),
                    category_id: food.id,
                    receipt_image: None,
                },
            )
            .await
            .unwrap();
    }

    let request = TestRequest::get()
        .uri("/transactions?period=all_time&transaction_type=expense")
        .cookie(session.clone())
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("за все время • Расходы"));
    assert!(page.contains("250.50"));
    assert!(!page.contains("1000"));

    let request = TestRequest::get()
        .uri("/transactions")
        .cookie(session)
        .to_request();
    let response = test::call_service(&service, request).await;
    let page = body_text(response).await;
    assert!(page.contains("без фильтров"));
    assert!(page.contains("Баланс: 749.50"));
}

#[rstest]
#[actix_rt::test]
async fn test_delete_confirm_and_cancel(_tracing_setup: &(), repos: Repos) {
    let (transaction_repo, category_repo, user_repo) = &repos;
    let test_user = TestUser::new(user_repo.clone()).await;
    let food = seed_category(category_repo, "Еда").await;
    let transaction = transaction_repo
        .create_new_transaction(
            test_user.user_id,
            kopilka_repo::transaction_repo::NewTransaction {
                amount: "99".parse().unwrap(),
                transaction_type: kopilka_repo::transaction_repo::TransactionType::Expense,
                description: String::new(),
                date: chrono::NaiveDate::from_ymd_opt(2024, 3, 5)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                category_id: food.id,
                receipt_image: None,
            },
        )
        .await
        .unwrap();

    let (dir, store) = receipt_store();
    let config = test_config(dir.path().to_path_buf());
    let service = test::init_service(build_web_app!(repos, store, config)).await;

    let jwt_auth = JWTAuth::from_secret(b"test-secret".to_vec());
    let session = Cookie::new(
        "kopilka_session",
        jwt_auth.create_session_token(test_user.user_id, false),
    );

    let request = TestRequest::get()
        .uri(&format!("/transactions/{}/delete", transaction.id))
        .cookie(session.clone())
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("Удалить"));
    assert!(page.contains("Отмена"));

    // cancel leaves the record untouched
    let request = TestRequest::post()
        .uri(&format!("/transactions/{}/delete", transaction.id))
        .cookie(session.clone())
        .set_form(&[("submit_cancel", "1")])
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(transaction_repo
        .get_transaction(test_user.user_id, transaction.id)
        .await
        .is_ok());

    let request = TestRequest::post()
        .uri(&format!("/transactions/{}/delete", transaction.id))
        .cookie(session)
        .set_form(&[("submit_delete", "1")])
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(LOCATION).unwrap(), "/transactions");
    assert!(transaction_repo
        .get_transaction(test_user.user_id, transaction.id)
        .await
        .is_err());
}

const BOUNDARY: &str = "----kopilka-test-boundary";

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some((file_name, data)) = file {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"receipt_image\"; filename=\"{}\"\r\n",
                file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

#[rstest]
#[actix_rt::test]
async fn test_editing_with_new_receipt_replaces_the_stored_file(_tracing_setup: &(), repos: Repos) {
    let (transaction_repo, category_repo, user_repo) = &repos;
    let test_user = TestUser::new(user_repo.clone()).await;
    let food = seed_category(category_repo, "Еда").await;
    let (dir, store) = receipt_store();
    let config = test_config(dir.path().to_path_buf());
    let service = test::init_service(build_web_app!(repos, store, config)).await;

    let jwt_auth = JWTAuth::from_secret(b"test-secret".to_vec());
    let session = Cookie::new(
        "kopilka_session",
        jwt_auth.create_session_token(test_user.user_id, false),
    );

    let category_id = food.id.to_string();
    let fields = [
        ("amount", "120"),
        ("type", "expense"),
        ("description", "чек"),
        ("category_id", category_id.as_str()),
        ("date", "2024-03-05"),
    ];
    let request = TestRequest::post()
        .uri("/transactions/add")
        .cookie(session.clone())
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(multipart_body(
            &fields,
            Some(("check.png", "first image".as_bytes())),
        ))
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let transactions = transaction_repo
        .get_all_transactions(test_user.user_id, Filter::NONE)
        .await
        .unwrap();
    let transaction = &transactions[0];
    let first_receipt = transaction.receipt_image.clone().expect("receipt stored");
    assert!(dir.path().join(&first_receipt).exists());

    let request = TestRequest::post()
        .uri(&format!("/transactions/{}/edit", transaction.id))
        .cookie(session)
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(multipart_body(
            &fields,
            Some(("check2.png", "second image".as_bytes())),
        ))
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let updated = transaction_repo
        .get_transaction(test_user.user_id, transaction.id)
        .await
        .unwrap();
    let second_receipt = updated.receipt_image.expect("receipt kept");
    assert_ne!(second_receipt, first_receipt);
    assert!(!dir.path().join(&first_receipt).exists());
    assert!(dir.path().join(&second_receipt).exists());
}

/// Delegates reads, fails every mutation.
struct UnwritableTransactionRepo(Arc<dyn TransactionRepo>);

#[async_trait]
impl TransactionRepo for UnwritableTransactionRepo {
    async fn get_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
    ) -> Result<Transaction, TransactionRepoError> {
        self.0.get_transaction(user, transaction_id).await
    }

    async fn get_all_transactions(
        &self,
        user: UserId,
        filter: Filter,
    ) -> Result<Vec<Transaction>, TransactionRepoError> {
        self.0.get_all_transactions(user, filter).await
    }

    async fn create_new_transaction(
        &self,
        _user: UserId,
        _new_transaction: NewTransaction,
    ) -> Result<Transaction, TransactionRepoError> {
        Err(TransactionRepoError::Other(anyhow::anyhow!(
            "database unavailable"
        )))
    }

    async fn update_transaction(
        &self,
        _user: UserId,
        _transaction_id: i32,
        _update: TransactionUpdate,
    ) -> Result<Transaction, TransactionRepoError> {
        Err(TransactionRepoError::Other(anyhow::anyhow!(
            "database unavailable"
        )))
    }

    async fn delete_transaction(
        &self,
        user: UserId,
        transaction_id: i32,
    ) -> Result<Transaction, TransactionRepoError> {
        self.0.delete_transaction(user, transaction_id).await
    }
}

#[rstest]
#[actix_rt::test]
async fn test_upload_is_removed_when_the_row_is_not_written(_tracing_setup: &(), repos: Repos) {
    let (transaction_repo, category_repo, user_repo) = repos;
    let test_user = TestUser::new(user_repo.clone()).await;
    let food = seed_category(&category_repo, "Еда").await;
    let repos: Repos = (
        Arc::new(UnwritableTransactionRepo(transaction_repo)) as Arc<dyn TransactionRepo>,
        category_repo,
        user_repo,
    );
    let (dir, store) = receipt_store();
    let config = test_config(dir.path().to_path_buf());
    let service = test::init_service(build_web_app!(repos, store, config)).await;

    let jwt_auth = JWTAuth::from_secret(b"test-secret".to_vec());
    let session = Cookie::new(
        "kopilka_session",
        jwt_auth.create_session_token(test_user.user_id, false),
    );

    let category_id = food.id.to_string();
    let fields = [
        ("amount", "120"),
        ("type", "expense"),
        ("category_id", category_id.as_str()),
        ("date", "2024-03-05"),
    ];
    let request = TestRequest::post()
        .uri("/transactions/add")
        .cookie(session)
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(multipart_body(&fields, Some(("check.png", "orphan".as_bytes()))))
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}
