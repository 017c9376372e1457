//! # Ledger Configuration
//!
//! Layered settings for the storage layer and the ledger services.
//!
//! ## Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Built-in defaults          (set_default below)                     │
//! │  2. TOML file, if present      (depot.toml or the path given)           │
//! │  3. Environment                DEPOT__LEDGER__MAX_ATTEMPTS=8            │
//! │                                DEPOT__DATABASE__PATH=/var/lib/depot.db  │
//! │                                                                         │
//! │  Later sources win.                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example file
//! ```toml
//! [database]
//! path = "data/depot.db"
//! max_connections = 8
//!
//! [ledger]
//! vat_bps = 1500
//! approval_roles = ["Salesman", "Sales Manager"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use depot_core::policy::RolePolicy;
use depot_core::validation::validate_tax_rate_bps;
use depot_core::{Role, TaxRate, DEFAULT_VAT_BPS};
use serde::Deserialize;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;
use crate::tx::RetryPolicy;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "depot";

/// Prefix of the environment overrides.
pub const ENV_PREFIX: &str = "DEPOT";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub database: DatabaseSettings,
    pub ledger: LedgerSettings,
}

/// `[database]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,

    /// How long a connection waits on a locked database before SQLITE_BUSY.
    pub busy_timeout_ms: u64,
}

/// `[ledger]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSettings {
    /// VAT on Receipt orders and performas, in basis points.
    pub vat_bps: u32,

    /// Attempts per operation before `ConcurrencyConflict`.
    pub max_attempts: u32,

    /// Linear backoff step between attempts.
    pub retry_backoff_ms: u64,

    /// Roles whose cancellations need approval.
    pub approval_roles: Vec<Role>,
}

impl LedgerSettings {
    pub fn vat_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.vat_bps)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_backoff_ms))
    }

    pub fn role_policy(&self) -> RolePolicy {
        RolePolicy::new(self.approval_roles.clone())
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            vat_bps: DEFAULT_VAT_BPS,
            max_attempts: 5,
            retry_backoff_ms: 20,
            approval_roles: RolePolicy::default().approval_roles().to_vec(),
        }
    }
}

impl DatabaseSettings {
    /// Pool configuration for these settings.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.path.clone())
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }
}

impl LedgerConfig {
    /// Loads defaults, then `file` (or `depot.toml` when `None`, both
    /// optional), then `DEPOT__*` environment variables.
    pub fn load(file: Option<&Path>) -> DbResult<Self> {
        let defaults = LedgerSettings::default();
        let roles: Vec<String> = defaults
            .approval_roles
            .iter()
            .map(|r| role_name(*r).to_string())
            .collect();

        let file_source = match file {
            Some(path) => File::from(path).required(false),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config = Config::builder()
            .set_default("database.path", "depot.db")?
            .set_default("database.max_connections", 5)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout_secs", 30)?
            .set_default("database.busy_timeout_ms", 5000)?
            .set_default("ledger.vat_bps", i64::from(defaults.vat_bps))?
            .set_default("ledger.max_attempts", i64::from(defaults.max_attempts))?
            .set_default("ledger.retry_backoff_ms", defaults.retry_backoff_ms as i64)?
            .set_default("ledger.approval_roles", roles)?
            .add_source(file_source)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("ledger.approval_roles")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: LedgerConfig = config.try_deserialize()?;
        loaded.validate()?;

        info!(
            path = %loaded.database.path.display(),
            vat_bps = loaded.ledger.vat_bps,
            max_attempts = loaded.ledger.max_attempts,
            "Ledger configuration loaded"
        );
        Ok(loaded)
    }

    fn validate(&self) -> DbResult<()> {
        validate_tax_rate_bps(self.ledger.vat_bps)?;
        if self.ledger.max_attempts == 0 {
            return Err(DbError::Config("ledger.max_attempts must be at least 1".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::Admin => "Admin",
        Role::Manager => "Manager",
        Role::SalesManager => "Sales Manager",
        Role::Salesman => "Salesman",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}.toml", name, uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let missing = std::env::temp_dir().join("depot-missing-config.toml");
        let cfg = LedgerConfig::load(Some(&missing)).unwrap();

        assert_eq!(cfg.ledger.vat_bps, 1500);
        assert_eq!(cfg.ledger.max_attempts, 5);
        assert_eq!(
            cfg.ledger.approval_roles,
            vec![Role::Salesman, Role::SalesManager]
        );
        assert_eq!(cfg.database.max_connections, 5);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = temp_file(
            "depot-config",
            r#"
            [database]
            path = "/tmp/ledger.db"
            busy_timeout_ms = 250

            [ledger]
            max_attempts = 9
            approval_roles = ["Salesman"]
            "#,
        );
        let cfg = LedgerConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(cfg.database.path, PathBuf::from("/tmp/ledger.db"));
        assert_eq!(cfg.database.busy_timeout_ms, 250);
        assert_eq!(cfg.ledger.max_attempts, 9);
        assert_eq!(cfg.ledger.approval_roles, vec![Role::Salesman]);
        assert_eq!(cfg.ledger.vat_bps, 1500);

        let db = cfg.database.db_config();
        assert_eq!(db.busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_rejects_invalid_vat() {
        let path = temp_file("depot-config-vat", "[ledger]\nvat_bps = 20000\n");
        let result = LedgerConfig::load(Some(&path));
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(DbError::Ledger(_))));
    }

    #[test]
    fn test_settings_helpers() {
        let settings = LedgerSettings::default();
        assert_eq!(settings.vat_rate().bps(), 1500);
        assert_eq!(settings.retry_policy().max_attempts, 5);
        assert_eq!(settings.role_policy(), RolePolicy::default());
    }
}
