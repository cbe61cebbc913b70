use anyhow::{Context, Result};
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use serde::Deserialize;
use std::fmt;

/// Database credentials parsed from the secret's JSON payload.
///
/// Invocation-scoped: fetched at the start of each invocation and dropped
/// with it, never cached across invocations.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Parse credentials from a secret string payload
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not JSON or is missing the
    /// `username` or `password` field
    pub fn from_payload(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).context("malformed secret payload")
    }
}

// Keep the password out of logs and error chains
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Source of database credentials
pub trait SecretsStore {
    /// Fetch the credentials for this invocation
    ///
    /// # Errors
    ///
    /// Returns an error if the secret cannot be retrieved or its payload
    /// does not hold valid credentials
    fn fetch_credentials(&self) -> impl Future<Output = Result<Credentials>> + Send;
}

/// AWS Secrets Manager backed credentials store
#[derive(Debug, Clone)]
pub struct SecretsManager {
    client: aws_sdk_secretsmanager::Client,
    secret_id: String,
}

impl SecretsManager {
    #[must_use]
    pub const fn new(client: aws_sdk_secretsmanager::Client, secret_id: String) -> Self {
        Self { client, secret_id }
    }
}

impl SecretsStore for SecretsManager {
    // No explicit request timeout here: the SDK's default timeout and retry
    // configuration bounds the call.
    async fn fetch_credentials(&self) -> Result<Credentials> {
        let value = self
            .client
            .get_secret_value()
            .secret_id(&self.secret_id)
            .send()
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "failed to read secret {}: {}",
                    self.secret_id,
                    DisplayErrorContext(&e)
                )
            })?;

        let payload = value
            .secret_string()
            .with_context(|| format!("secret {} has no string payload", self.secret_id))?;

        Credentials::from_payload(payload)
    }
}
