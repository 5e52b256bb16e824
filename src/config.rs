use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";
const DEFAULT_HEARTBEAT_SECS: u64 = 30;
const DEFAULT_API_RPS: u32 = 100;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    /// `None` runs the service on the in-memory repository.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub upload_dir: String,
    pub webhook_base_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub hub_heartbeat: Duration,
    pub telegram_api_base: String,
    pub api_rps: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let hub_heartbeat_secs = match env::var("HUB_HEARTBEAT_SECS") {
            Ok(_) => get_env_parse::<u64>("HUB_HEARTBEAT_SECS")?,
            Err(_) => DEFAULT_HEARTBEAT_SECS,
        };

        let api_rps = match env::var("API_RPS") {
            Ok(_) => get_env_parse::<u32>("API_RPS")?,
            Err(_) => DEFAULT_API_RPS,
        };

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env_opt("DATABASE_URL"),
            jwt_secret: get_env("JWT_SECRET")?,
            upload_dir: get_env_opt("UPLOAD_DIR").unwrap_or_else(|| "./uploads".to_string()),
            webhook_base_url: get_env_opt("WEBHOOK_BASE_URL"),
            webhook_secret: get_env_opt("WEBHOOK_SECRET"),
            admin_email: get_env_opt("ADMIN_EMAIL"),
            admin_password: get_env_opt("ADMIN_PASSWORD"),
            hub_heartbeat: Duration::from_secs(hub_heartbeat_secs.max(1)),
            telegram_api_base: get_env_opt("TELEGRAM_API_BASE")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API.to_string()),
            api_rps,
        })
    }

    pub fn local(jwt_secret: &str, upload_dir: &str) -> Self {
        Self {
            server_address: "127.0.0.1:0".to_string(),
            database_url: None,
            jwt_secret: jwt_secret.to_string(),
            upload_dir: upload_dir.to_string(),
            webhook_base_url: None,
            webhook_secret: None,
            admin_email: None,
            admin_password: None,
            hub_heartbeat: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            telegram_api_base: DEFAULT_TELEGRAM_API.to_string(),
            api_rps: 1000,
        }
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}
