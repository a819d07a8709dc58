//! Configuration module for tixgate-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables. Also handles admin secret hashing.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{
    AdminConfig, CounterConfig, GatewayConfig, NotifierConfig, ReconcileConfig, ServerConfig,
    SharedConfig, VerificationConfig,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("password hashing error: {0}")]
    HashError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub counter: CounterConfig,
    pub gateway: GatewayConfig,
    pub notifier: NotifierConfig,
    pub verification: VerificationConfig,
    pub reconcile: ReconcileConfig,
}

impl LoadedConfig {
    /// Convert the reloadable sections into a SharedConfig with
    /// Arc<RwLock<T>> wrappers.
    pub fn into_shared(self) -> SharedConfig {
        SharedConfig {
            server: Arc::new(RwLock::new(self.server)),
            admin: Arc::new(RwLock::new(self.admin)),
            counter: Arc::new(RwLock::new(self.counter)),
            gateway: Arc::new(RwLock::new(self.gateway)),
            verification: Arc::new(RwLock::new(self.verification)),
        }
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Hash the admin secret if it's plaintext (and rewrite the file)
    /// 5. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        self.validate(&file_config)?;

        let secret_hash = if file_config.is_admin_secret_hashed() {
            file_config.admin.secret.clone()
        } else {
            let hash = self.hash_secret(&file_config.admin.secret)?;
            file_config.admin.secret = hash.clone();
            self.rewrite_config(&file_config)?;
            tracing::info!("Admin secret hashed and config file updated");
            hash
        };

        Ok(build_loaded_config(file_config, secret_hash))
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        if config.counter.secret.len() < 16 {
            return Err(ConfigError::ValidationError(
                "counter secret must be at least 16 bytes".to_string(),
            ));
        }
        if config.gateway.secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "gateway secret must not be empty".to_string(),
            ));
        }
        if !(-14..=14).contains(&config.server.utc_offset_hours) {
            return Err(ConfigError::ValidationError(format!(
                "utc_offset_hours {} is not a real offset",
                config.server.utc_offset_hours
            )));
        }
        Ok(())
    }

    fn hash_secret(&self, plaintext: &str) -> Result<String, ConfigError> {
        use argon2::{
            Argon2, PasswordHasher,
            password_hash::{SaltString, rand_core::OsRng},
        };

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ConfigError::HashError(e.to_string()))
    }

    fn rewrite_config(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)?;

        // Write atomically: write to temp file, then rename
        let temp_path = self.config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string)?;
        std::fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

fn build_loaded_config(file_config: FileConfig, secret_hash: String) -> LoadedConfig {
    LoadedConfig {
        server: ServerConfig {
            listen: file_config.server.listen,
            utc_offset_hours: file_config.server.utc_offset_hours,
        },
        admin: AdminConfig::new(secret_hash),
        counter: CounterConfig::new(
            file_config.counter.name,
            file_config.counter.secret.into_bytes().into_boxed_slice(),
        ),
        gateway: GatewayConfig::new(
            file_config.gateway.endpoint,
            file_config.gateway.secret,
            file_config.gateway.account_ref.into(),
            file_config.gateway.currency.into(),
            std::time::Duration::from_secs(file_config.gateway.timeout_secs),
        ),
        notifier: NotifierConfig {
            endpoint: file_config.notifier.endpoint,
            secret: file_config.notifier.secret,
        },
        verification: VerificationConfig {
            early_entry_minutes: file_config.verification.early_entry_minutes,
        },
        reconcile: ReconcileConfig {
            interval: std::time::Duration::from_secs(file_config.reconcile.interval_secs),
        },
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
