use anyhow::Context;
use dotenvy::dotenv;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

/// ✅ Global Config stored in `OnceLock`
static CONFIG: OnceLock<Arc<Config>> = OnceLock::new();

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: SocketAddr,
    pub attachment_storage_path: PathBuf,
    pub max_upload_bytes: usize,
    pub log_dir: PathBuf,
    /// Admin account created on first start when the users table is empty
    pub bootstrap_admin: Option<(String, String)>,
}

impl Config {
    /// ✅ Load environment variables and set defaults
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env only once

        let server_addr = env::var("SERVER_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .context("SERVER_ADDR must be a socket address such as 127.0.0.1:3000")?;

        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(raw) => raw.parse().context("MAX_UPLOAD_BYTES must be a byte count")?,
            Err(_) => 10 * 1024 * 1024,
        };

        let bootstrap_admin = match (
            env::var("BOOTSTRAP_ADMIN_USERNAME"),
            env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => Some((username, password)),
            _ => None,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            server_addr,
            attachment_storage_path: PathBuf::from(
                env::var("ATTACHMENT_STORAGE_PATH")
                    .unwrap_or_else(|_| "storage/attachments".to_string()),
            ),
            max_upload_bytes,
            log_dir: PathBuf::from(env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string())),
            bootstrap_admin,
        })
    }

    /// ✅ Initialize the global config
    pub fn init() -> anyhow::Result<Arc<Config>> {
        let config = Arc::new(Self::from_env()?);
        CONFIG
            .set(config.clone())
            .map_err(|_| anyhow::anyhow!("Config already initialized"))?;
        Ok(config)
    }

    /// ✅ Safe access to Config
    pub fn get() -> Arc<Config> {
        CONFIG.get().expect("Config not initialized").clone()
    }
}
