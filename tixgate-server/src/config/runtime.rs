//! Runtime configuration types.
//!
//! The TOML shapes in [`super::file`] are converted into these at load
//! time; reloadable sections sit behind their own locks in
//! [`SharedConfig`] so a SIGHUP can swap one section without contending
//! on the others.

use compact_str::CompactString;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

/// Server section after load.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub utc_offset_hours: i8,
}

impl ServerConfig {
    pub fn utc_offset(&self) -> time::UtcOffset {
        time::UtcOffset::from_hms(self.utc_offset_hours, 0, 0)
            .unwrap_or(time::UtcOffset::UTC)
    }
}

/// Admin section: only the argon2 hash is kept in memory.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    secret_hash: String,
}

impl AdminConfig {
    pub fn new(secret_hash: String) -> Self {
        Self { secret_hash }
    }

    /// Verify a presented plaintext secret against the stored hash.
    pub fn verify_secret(&self, presented: &str) -> bool {
        use argon2::{Argon2, PasswordHash, PasswordVerifier};

        let Ok(parsed) = PasswordHash::new(&self.secret_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(presented.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Counter section: the request-signing secret shared with sales
/// counters and gate scanners.
#[derive(Debug, Clone)]
pub struct CounterConfig {
    pub name: String,
    secret: Box<[u8]>,
}

impl CounterConfig {
    pub fn new(name: String, secret: Box<[u8]>) -> Self {
        Self { name, secret }
    }

    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }
}

/// Gateway section after load.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub endpoint: Url,
    secret: String,
    pub account_ref: CompactString,
    pub currency: CompactString,
    pub timeout: std::time::Duration,
}

impl GatewayConfig {
    pub fn new(
        endpoint: Url,
        secret: String,
        account_ref: CompactString,
        currency: CompactString,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            endpoint,
            secret,
            account_ref,
            currency,
            timeout,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn secret_bytes(&self) -> &[u8] {
        self.secret.as_bytes()
    }
}

/// SMS relay section after load.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub endpoint: Url,
    pub secret: String,
}

/// Gate verification tuning after load.
#[derive(Debug, Clone, Copy)]
pub struct VerificationConfig {
    pub early_entry_minutes: i64,
}

/// Reconciler tuning after load.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileConfig {
    pub interval: std::time::Duration,
}

/// Reloadable configuration sections, one lock each.
#[derive(Clone)]
pub struct SharedConfig {
    pub server: Arc<RwLock<ServerConfig>>,
    pub admin: Arc<RwLock<AdminConfig>>,
    pub counter: Arc<RwLock<CounterConfig>>,
    pub gateway: Arc<RwLock<GatewayConfig>>,
    pub verification: Arc<RwLock<VerificationConfig>>,
}
