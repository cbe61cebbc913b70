use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use sqlx::{
    ConnectOptions, Connection,
    mysql::{MySqlConnectOptions, MySqlConnection},
};
use std::time::{Duration, Instant};
use tokio::time;

use super::Database;
use crate::{
    config::Config,
    metrics::CONNECT_DURATION,
    secrets::Credentials,
    tls::{TlsConfig, TlsMode},
};

/// `MySQL` database collaborator, normally reached through an RDS proxy
#[derive(Debug, Clone)]
pub struct MySql {
    host: String,
    port: u16,
    database: String,
    connect_timeout: Duration,
    tls: TlsConfig,
}

impl MySql {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            host: config.db_host.clone(),
            port: config.db_port,
            database: config.db_name.clone(),
            connect_timeout: config.connect_timeout,
            tls: config.tls.clone(),
        }
    }

    fn connect_options(&self, creds: &Credentials, mode: TlsMode) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&creds.username)
            .password(&creds.password)
            .database(&self.database)
            .ssl_mode(mode.to_ssl_mode());

        // Custom CA only matters when the certificate is verified
        if mode.is_verifying()
            && let Some(ca) = &self.tls.ca
        {
            options = options.ssl_ca(ca);
        }

        options
    }
}

impl Database for MySql {
    type Conn = MySqlConnection;

    async fn connect(&self, creds: &Credentials, mode: TlsMode) -> Result<MySqlConnection> {
        let options = self.connect_options(creds, mode);

        let connect_timer = Instant::now();
        let conn = time::timeout(self.connect_timeout, options.connect())
            .await
            .map_err(|_| {
                anyhow!(
                    "connection to {}:{} timed out after {}s",
                    self.host,
                    self.port,
                    self.connect_timeout.as_secs()
                )
            })?
            .with_context(|| format!("failed to connect to {}:{}", self.host, self.port))?;
        CONNECT_DURATION.observe(connect_timer.elapsed().as_secs_f64());

        Ok(conn)
    }

    async fn server_time(&self, conn: &mut MySqlConnection) -> Result<String> {
        let now: NaiveDateTime = sqlx::query_scalar("SELECT NOW()")
            .fetch_one(conn)
            .await
            .context("failed to read server time")?;

        // "YYYY-MM-DD HH:MM:SS", matching what callers already parse
        Ok(now.format("%Y-%m-%d %H:%M:%S").to_string())
    }

    // Gracefully close the connection to avoid "Connection reset by peer"
    // noise in the proxy logs
    async fn close(&self, conn: MySqlConnection) {
        let _ = conn.close().await;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use std::collections::HashMap;

    fn test_config() -> Config {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DBPING_SECRET_ID", "MySQLDB11Secret"),
            ("DBPING_DB_HOST", "localhost"),
            ("DBPING_DB_NAME", "testdb"),
        ]);
        Config::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap()
    }

    fn test_creds() -> Credentials {
        Credentials::from_payload(r#"{"username": "u", "password": "p"}"#).unwrap()
    }

    #[test]
    fn test_new_from_config() {
        let db = MySql::new(&test_config());
        assert_eq!(db.host, "localhost");
        assert_eq!(db.port, 3306);
        assert_eq!(db.database, "testdb");
        assert_eq!(db.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_connect_options_build() {
        let db = MySql::new(&test_config());
        // Options must build for every mode without touching the network
        for mode in [
            TlsMode::Disable,
            TlsMode::Require,
            TlsMode::VerifyCa,
            TlsMode::VerifyFull,
        ] {
            let _ = db.connect_options(&test_creds(), mode);
        }
    }

    #[tokio::test]
    async fn test_connect_refused_is_error() {
        // Port 1 on localhost refuses immediately; the error must surface
        // within the connect timeout
        let mut config = test_config();
        config.db_port = 1;
        config.connect_timeout = Duration::from_secs(2);
        let db = MySql::new(&config);

        let result = db.connect(&test_creds(), TlsMode::Disable).await;
        assert!(result.is_err());
        let err = format!("{:#}", result.unwrap_err());
        assert!(err.contains("localhost:1"), "unexpected error: {err}");
    }
}
