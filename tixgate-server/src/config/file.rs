//! TOML file configuration structures.
//!
//! These structs directly map to the `tixgate-config.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerSection,
    pub admin: AdminSection,
    pub counter: CounterSection,
    pub gateway: GatewaySection,
    pub notifier: NotifierSection,
    #[serde(default)]
    pub verification: VerificationSection,
    #[serde(default)]
    pub reconcile: ReconcileSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
    /// Venue timezone as whole hours from UTC; the date and time gates
    /// decide "today" in this offset.
    #[serde(default)]
    pub utc_offset_hours: i8,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSection {
    /// The admin secret. If this is plaintext (doesn't start with `$argon2`),
    /// it will be hashed and the config file will be rewritten.
    pub secret: String,
}

/// Counter configuration section: the shared secret every sales counter
/// and gate scanner signs its requests with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterSection {
    /// Human-readable operator name.
    pub name: String,
    /// Secret key for signing API requests.
    pub secret: String,
}

/// Payment gateway configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySection {
    /// Charge endpoint of the provider.
    pub endpoint: Url,
    /// Shared secret; also signs the provider's settlement callbacks.
    pub secret: String,
    /// Merchant account reference at the provider.
    pub account_ref: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_currency() -> String {
    "KRW".to_string()
}

fn default_gateway_timeout_secs() -> u64 {
    10
}

/// SMS relay configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierSection {
    pub endpoint: Url,
    pub secret: String,
}

/// Gate verification tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSection {
    #[serde(default = "default_early_entry_minutes")]
    pub early_entry_minutes: i64,
}

impl Default for VerificationSection {
    fn default() -> Self {
        Self {
            early_entry_minutes: default_early_entry_minutes(),
        }
    }
}

fn default_early_entry_minutes() -> i64 {
    tixgate_core::verify::DEFAULT_EARLY_ENTRY_MINUTES
}

/// Reconciler tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileSection {
    #[serde(default = "default_reconcile_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            interval_secs: default_reconcile_interval_secs(),
        }
    }
}

fn default_reconcile_interval_secs() -> u64 {
    300
}

impl FileConfig {
    /// Check if the admin secret is already hashed (argon2 format).
    pub fn is_admin_secret_hashed(&self) -> bool {
        self.admin.secret.starts_with("$argon2")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"
utc_offset_hours = 9

[admin]
secret = "test-secret"

[counter]
name = "Main Desk"
secret = "counter123"

[gateway]
endpoint = "https://pg.example.com/charges"
secret = "gw-secret"
account_ref = "merchant-042"

[notifier]
endpoint = "https://sms.example.com/send"
secret = "sms-secret"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.server.utc_offset_hours, 9);
        assert_eq!(config.counter.name, "Main Desk");
        assert_eq!(config.gateway.currency, "KRW");
        assert_eq!(config.gateway.timeout_secs, 10);
        assert_eq!(config.verification.early_entry_minutes, 120);
        assert_eq!(config.reconcile.interval_secs, 300);
        assert!(!config.is_admin_secret_hashed());
    }

    #[test]
    fn test_hashed_secret_detection() {
        let toml_str = r#"
[server]

[admin]
secret = "$argon2id$v=19$m=19456,t=2,p=1$abc123"

[counter]
name = "Main Desk"
secret = "counter123"

[gateway]
endpoint = "https://pg.example.com/charges"
secret = "gw-secret"
account_ref = "merchant-042"

[notifier]
endpoint = "https://sms.example.com/send"
secret = "sms-secret"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert!(config.is_admin_secret_hashed());
        assert_eq!(config.server.listen.port(), 8080);
    }
}
