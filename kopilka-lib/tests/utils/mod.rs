use std::sync::Arc;

use rstest::*;
use tracing::info;
use tracing::Level;
use uuid::Uuid;

use kopilka_lib::auth::password::encode_password;
use kopilka_repo::category_repo::{Category, CategoryRepo};
use kopilka_repo::transaction_repo::TransactionRepo;
use kopilka_repo::user_repo::{NewUser, UserId, UserRepo};

pub mod mock;

pub type Repos = (
    Arc<dyn TransactionRepo>,
    Arc<dyn CategoryRepo>,
    Arc<dyn UserRepo>,
);

/// Full API app behind the mock auth middleware.
macro_rules! build_api_app {
    ($repos:ident, $receipt_store:expr, $user_id:expr) => {{
        let (transaction_repo, category_repo, user_repo) = $repos.clone();
        let category_cache = Data::new(kopilka_lib::category::CategoryCache::new(
            category_repo,
            std::time::Duration::from_secs(300),
        ));
        let app = App::new()
            .app_data(Data::new(transaction_repo))
            .app_data(Data::new(user_repo))
            .app_data(category_cache)
            .app_data(Data::new($receipt_store))
            .wrap(kopilka_lib::tracing::create_middleware())
            .service(
                kopilka_lib::transaction::transaction_service()
                    .wrap(MockAuthentication { user_id: $user_id }),
            )
            .service(
                kopilka_lib::category::category_service()
                    .wrap(MockAuthentication { user_id: $user_id }),
            )
            .service(
                kopilka_lib::user::user_service().wrap(MockAuthentication { user_id: $user_id }),
            );
        tracing::info!("Built app");
        app
    }};
}

pub struct TestUser {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub password: String,
    repo: Arc<dyn UserRepo>,
}

impl TestUser {
    pub async fn new(user_repo: Arc<dyn UserRepo>) -> TestUser {
        let suffix = Uuid::new_v4().simple().to_string();
        let username = format!("user{}", &suffix[..8]);
        let email = format!("{}@example.com", username);
        let password = "pass123".to_owned();
        let user = user_repo
            .create_user(NewUser {
                username: username.clone(),
                email: email.clone(),
                password_hash: encode_password(&password).unwrap(),
            })
            .await
            .unwrap();
        info!(user_id = user.id, "Created user");
        TestUser {
            user_id: user.id,
            username,
            email,
            password,
            repo: user_repo,
        }
    }

    pub async fn delete(&self) {
        self.repo.delete_user(self.user_id).await.unwrap()
    }
}

pub async fn seed_category(category_repo: &Arc<dyn CategoryRepo>, name: &str) -> Category {
    category_repo.create_category(name).await.unwrap()
}

#[fixture]
#[once]
pub fn tracing_setup() -> () {
    tracing_subscriber::fmt()
        .pretty()
        .with_max_level(Level::DEBUG)
        .init();
    info!("tracing initialized");
}

#[fixture]
pub fn repos() -> Repos {
    kopilka_repo::mem_repo::create_repos()
}

pub fn receipt_store() -> (tempfile::TempDir, kopilka_lib::receipt::ReceiptStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = kopilka_lib::receipt::ReceiptStore::new(dir.path()).unwrap();
    (dir, store)
}
