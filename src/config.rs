use crate::tls::TlsConfig;
use anyhow::{Context, Result, anyhow};
use std::{env, path::PathBuf, time::Duration};

const DEFAULT_DB_PORT: u16 = 3306;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Runtime configuration, resolved once at cold start.
///
/// Everything the original deployment kept as hard-coded constants (secret
/// id, region, proxy endpoint, database name) is taken from the function's
/// environment so the same build can be deployed per environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Secrets Manager secret id holding the database credentials
    pub secret_id: String,
    /// AWS region override; when unset the SDK's default chain is used
    pub region: Option<String>,
    /// RDS proxy endpoint hostname
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    /// Bound on each connection attempt
    pub connect_timeout: Duration,
    /// TLS mode for the first connection attempt
    pub tls: TlsConfig,
    /// Allow the retry with certificate verification disabled
    pub tls_fallback: bool,
}

impl Config {
    /// Build the configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value fails
    /// to parse
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup; tests inject
    /// maps here instead of mutating the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value fails
    /// to parse
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key).ok_or_else(|| anyhow!("missing required environment variable {key}"))
        };

        let db_port = match lookup("DBPING_DB_PORT") {
            Some(port) => port
                .parse::<u16>()
                .with_context(|| format!("invalid DBPING_DB_PORT: {port}"))?,
            None => DEFAULT_DB_PORT,
        };

        let connect_timeout_secs = match lookup("DBPING_CONNECT_TIMEOUT") {
            Some(secs) => secs
                .parse::<u64>()
                .with_context(|| format!("invalid DBPING_CONNECT_TIMEOUT: {secs}"))?,
            None => DEFAULT_CONNECT_TIMEOUT_SECS,
        };

        let tls_mode = match lookup("DBPING_TLS_MODE") {
            Some(mode) => mode.parse().map_err(|e: String| anyhow!(e))?,
            None => crate::tls::TlsMode::default(),
        };

        Ok(Self {
            secret_id: require("DBPING_SECRET_ID")?,
            region: lookup("DBPING_REGION"),
            db_host: require("DBPING_DB_HOST")?,
            db_port,
            db_name: require("DBPING_DB_NAME")?,
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            tls: TlsConfig {
                mode: tls_mode,
                ca: lookup("DBPING_TLS_CA").map(PathBuf::from),
            },
            tls_fallback: lookup("DBPING_TLS_FALLBACK")
                .is_some_and(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on")),
        })
    }
}
