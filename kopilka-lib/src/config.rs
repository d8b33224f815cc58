use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;
use std::{env, fs};

const DEFAULT_CATEGORY_CACHE_TTL_SECS: u64 = 300;

#[derive(Deserialize, Clone)]
pub struct SSLConfig {
    pub private_key_file: PathBuf,
    pub certificate_chain_file: PathBuf,
}

#[derive(Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub signups_enabled: bool,
    #[serde(default = "default_category_cache_ttl")]
    pub category_cache_ttl_secs: u64,
    pub ssl: Option<SSLConfig>,
}

fn default_category_cache_ttl() -> u64 {
    DEFAULT_CATEGORY_CACHE_TTL_SECS
}

impl Config {
    pub fn from_file(path: PathBuf) -> Result<Config, anyhow::Error> {
        let config = fs::read_to_string(path).context("Unable to read config file")?;
        let config: Config =
            toml::from_str(config.as_str()).with_context(|| "Unable to parse config")?;
        Ok(config)
    }

    pub fn from_env() -> Result<Config, anyhow::Error> {
        let database_url = read_env("DATABASE_URL")?;
        let upload_dir = PathBuf::from(read_env("UPLOAD_DIR")?);
        let signups_enabled = read_env("SIGNUPS_ENABLED")?
            .parse()
            .context("Unable to parse SIGNUPS_ENABLED value")?;
        let category_cache_ttl_secs = match env::var("CATEGORY_CACHE_TTL_SECS") {
            Ok(value) => value
                .parse()
                .context("Unable to parse CATEGORY_CACHE_TTL_SECS value")?,
            Err(_) => DEFAULT_CATEGORY_CACHE_TTL_SECS,
        };

        let config = Config {
            database_url,
            upload_dir,
            signups_enabled,
            category_cache_ttl_secs,
            ssl: None,
        };
        Ok(config)
    }
}

fn read_env(key: &str) -> Result<String, anyhow::Error> {
    env::var(key).with_context(|| format!("Unable to read env var: {}", key))
}
