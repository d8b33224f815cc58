#[macro_use]
extern crate tracing;

use std::error::Error;
use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actix_files::Files;
use actix_web::error::JsonPayloadError;
use actix_web::web::Data;
use actix_web::{web, App};
use actix_web::{HttpResponse, HttpServer};
use actix_web_httpauth::middleware::HttpAuthentication;
use anyhow::Context;
use clap::{Parser, Subcommand};
use kopilka_repo::category_repo::{CategoryRepo, CategoryRepoError};
use rand::Rng;
use rustls::{Certificate, PrivateKey, ServerConfig};
use rustls_pemfile::{certs, pkcs8_private_keys};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry;

use kopilka_lib::auth::jwt::JWTAuth;
use kopilka_lib::category::CategoryCache;
use kopilka_lib::config::Config;
use kopilka_lib::receipt::ReceiptStore;
use kopilka_lib::{auth, category, transaction, user};

#[derive(Parser)]
#[command(name = "kopilka-server", about = "Личный трекер финансов")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Seed categories, skipping ones that already exist
    AddCategories {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let subscriber = registry::Registry::default()
        .with(LevelFilter::INFO)
        .with(tracing_subscriber::fmt::Layer::default());
    tracing::subscriber::set_global_default(subscriber).expect("set up subscriber");
    info!("tracing initialized");

    let cli = Cli::parse();

    let config = match get_config_file() {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    let (transaction_repo, category_repo, user_repo) =
        kopilka_repo::sqlx_repo::create_repos(&config.database_url, 10).await?;

    if let Some(Command::AddCategories { names }) = cli.command {
        return add_categories(category_repo, names).await;
    }

    let secret = get_secret()?;
    let jwt_auth = JWTAuth::from_secret(secret);
    let bearer_auth_middleware = HttpAuthentication::bearer(auth::credentials_validator);

    let category_cache = Data::new(CategoryCache::new(
        category_repo.clone(),
        Duration::from_secs(config.category_cache_ttl_secs),
    ));
    let receipt_store = ReceiptStore::new(&config.upload_dir)?;
    let upload_dir = config.upload_dir.clone();
    let ssl_config = config.ssl.clone();
    let app_config = Data::new(config);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(jwt_auth.clone())
            .app_data(Data::new(transaction_repo.clone()))
            .app_data(Data::new(user_repo.clone()))
            .app_data(category_cache.clone())
            .app_data(Data::new(receipt_store.clone()))
            .app_data(app_config.clone())
            .wrap(kopilka_lib::tracing::create_middleware())
            .service(
                web::scope("/api")
                    .service(auth::handlers::auth_service())
                    .service(
                        transaction::transaction_service().wrap(bearer_auth_middleware.clone()),
                    )
                    .service(category::category_service().wrap(bearer_auth_middleware.clone()))
                    .service(user::user_service().wrap(bearer_auth_middleware.clone())),
            )
            .service(Files::new("/uploads", upload_dir.clone()))
            .service(kopilka_lib::web::web_service())
            .app_data(web::JsonConfig::default().error_handler(|err, req| {
                error!(req_path = req.path(), %err);
                match err {
                    JsonPayloadError::Deserialize(deserialize_err) => {
                        let error_body = serde_json::json!({
                            "error": {
                                "code": 400,
                                "message": "Неверный JSON",
                                "details": format!("{}", deserialize_err),
                            }
                        });
                        actix_web::error::InternalError::from_response(
                            deserialize_err,
                            HttpResponse::BadRequest()
                                .content_type("application/json")
                                .body(error_body.to_string()),
                        )
                        .into()
                    }
                    _ => err.into(),
                }
            }))
    });
    server = match ssl_config {
        None => {
            warn!("Using http");
            server.bind("0.0.0.0:8000")?
        }
        Some(ssl_config) => {
            info!("Using https");

            let config = ServerConfig::builder()
                .with_safe_defaults()
                .with_no_client_auth();

            let mut cert_file = BufReader::new(
                File::open(ssl_config.certificate_chain_file)
                    .context("Error opening certificate chain file")?,
            );
            let mut key_file = BufReader::new(
                File::open(ssl_config.private_key_file)
                    .context("Error opening private key file")?,
            );

            let cert_chain = certs(&mut cert_file)
                .context("Unable to read certificate chain file")?
                .into_iter()
                .map(Certificate)
                .collect();
            let mut keys: Vec<PrivateKey> = pkcs8_private_keys(&mut key_file)
                .context("Unable to read private key file")?
                .into_iter()
                .map(PrivateKey)
                .collect();

            if keys.is_empty() {
                error!("No private key found in file");
                std::process::exit(1);
            }

            let config = config.with_single_cert(cert_chain, keys.remove(0))?;

            server.bind_rustls("0.0.0.0:8000", config)?
        }
    };
    server.run().await?;

    Ok(())
}

async fn add_categories(
    category_repo: Arc<dyn CategoryRepo>,
    names: Vec<String>,
) -> Result<(), Box<dyn Error>> {
    let mut added = 0;
    let mut existed = 0;
    for name in names {
        let name = capitalize(name.trim());
        match category_repo.create_category(&name).await {
            Ok(category) => {
                added += 1;
                info!(category = category.name, "Категория добавлена");
            }
            Err(CategoryRepoError::CategoryExists(_)) => {
                existed += 1;
                info!(category = name, "Категория уже существует");
            }
            Err(e) => return Err(e.into()),
        }
    }
    println!("Добавлено {} категорий, пропущено {}", added, existed);
    Ok(())
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn get_config_file() -> Option<PathBuf> {
    let config_current_dir = PathBuf::from("config.toml");
    if config_current_dir.exists() {
        return Some(config_current_dir);
    }
    if let Ok(config_env) = std::env::var("CONFIGURATION_DIRECTORY") {
        let config_path = PathBuf::from(config_env).join("config.toml");
        if config_path.exists() {
            return Some(config_path);
        }
    }

    None
}

fn get_state_dir() -> PathBuf {
    if let Ok(state_env) = std::env::var("STATE_DIRECTORY") {
        return PathBuf::from(state_env);
    }

    PathBuf::from("data")
}

/// Gets the secret from file. If the file does not exist it will generate a new secret and save it
/// to the file
fn get_secret() -> Result<Vec<u8>, Box<dyn Error>> {
    let state_dir = get_state_dir();
    let secret_file = state_dir.join("secret");
    if secret_file.exists() {
        Ok(fs::read(secret_file)?)
    } else {
        let mut rng = rand::thread_rng();
        let mut secret: [u8; 128] = [0; 128];
        rng.fill(&mut secret);

        fs::create_dir_all(state_dir)?;
        fs::write(secret_file, secret)?;

        Ok(secret.to_vec())
    }
}
