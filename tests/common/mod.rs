#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use anyhow::{Result, bail};
use dbping::{
    queries::Database,
    secrets::{Credentials, SecretsStore},
    tls::TlsMode,
};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

pub const SERVER_TIME: &str = "2024-01-01 00:00:00";

/// Canned secrets collaborator
pub enum StubSecrets {
    Ok(&'static str, &'static str),
    Fail(&'static str),
}

impl SecretsStore for StubSecrets {
    async fn fetch_credentials(&self) -> Result<Credentials> {
        match self {
            Self::Ok(username, password) => Ok(Credentials {
                username: (*username).to_string(),
                password: (*password).to_string(),
            }),
            Self::Fail(message) => bail!(*message),
        }
    }
}

/// Scriptable database collaborator; counts connection attempts and closes
/// so tests can assert stage ordering and resource release
pub struct StubDb {
    pub fail_verified: Option<&'static str>,
    pub fail_insecure: Option<&'static str>,
    pub fail_query: Option<&'static str>,
    pub panic_in_query: bool,
    pub time: &'static str,
    pub connects: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl StubDb {
    pub fn healthy() -> Self {
        Self {
            fail_verified: None,
            fail_insecure: None,
            fail_query: None,
            panic_in_query: false,
            time: SERVER_TIME,
            connects: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (Arc::clone(&self.connects), Arc::clone(&self.closes))
    }
}

impl Database for StubDb {
    type Conn = ();

    async fn connect(&self, _creds: &Credentials, mode: TlsMode) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if mode.is_verifying() {
            if let Some(message) = self.fail_verified {
                bail!(message);
            }
        } else if let Some(message) = self.fail_insecure {
            bail!(message);
        }
        Ok(())
    }

    async fn server_time(&self, _conn: &mut ()) -> Result<String> {
        assert!(!self.panic_in_query, "query panicked");
        if let Some(message) = self.fail_query {
            bail!(message);
        }
        Ok(self.time.to_string())
    }

    async fn close(&self, _conn: ()) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
