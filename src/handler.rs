use crate::{
    metrics::{
        INVOCATIONS_TOTAL, LAST_SUCCESS, PANICS_RECOVERED, RUNTIME, STAGE_ERRORS, TLS_FALLBACKS,
    },
    queries::Database,
    secrets::{Credentials, SecretsStore},
    tls::TlsMode,
};
use chrono::{SecondsFormat, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::panic::AssertUnwindSafe;

/// The externally observable result of an invocation: an API Gateway style
/// status code plus a JSON-encoded body. Exactly one of
/// `{"current_time": …}` or `{"error": …}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Response {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl Response {
    #[must_use]
    pub fn ok(current_time: &str) -> Self {
        Self {
            status_code: 200,
            body: json!({ "current_time": current_time }).to_string(),
        }
    }

    #[must_use]
    pub fn error(message: &str) -> Self {
        Self {
            status_code: 500,
            body: json!({ "error": message }).to_string(),
        }
    }
}

/// One JSON log line per invocation
#[derive(Serialize, Deserialize, Debug, Default)]
struct Report {
    runtime_ms: i64,
    time: String,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    tls_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Stage of the invocation pipeline an error was caught at; errors never
/// cross a stage boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Secrets,
    Connect,
    Query,
}

impl Stage {
    const fn label(self) -> &'static str {
        match self {
            Self::Secrets => "secrets",
            Self::Connect => "connect",
            Self::Query => "query",
        }
    }
}

fn stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Invocation pipeline: credentials, connection (with the optional
/// unverified-TLS retry), one diagnostic query, response.
///
/// Collaborators are injected so the pipeline can be exercised with test
/// doubles; per-invocation state never outlives `handle`.
pub struct Handler<S, D> {
    secrets: S,
    db: D,
    tls_mode: TlsMode,
    tls_fallback: bool,
}

impl<S, D> Handler<S, D>
where
    S: SecretsStore + Send + Sync,
    D: Database + Send + Sync,
{
    #[must_use]
    pub const fn new(secrets: S, db: D, tls_mode: TlsMode, tls_fallback: bool) -> Self {
        Self {
            secrets,
            db,
            tls_mode,
            tls_fallback,
        }
    }

    /// Handle one invocation. The event payload is accepted but carries no
    /// information the pipeline uses.
    ///
    /// Always produces a well-formed `Response`; a panic inside the pipeline
    /// is recovered and reported as a 500.
    pub async fn handle(&self, _event: &Value) -> Response {
        match AssertUnwindSafe(self.run()).catch_unwind().await {
            Ok(response) => response,
            Err(panic_info) => {
                let message = panic_info
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                eprintln!("{} - panic during invocation: {message}", stamp());
                PANICS_RECOVERED.inc();
                INVOCATIONS_TOTAL.with_label_values(&["error"]).inc();
                Response::error("internal error")
            }
        }
    }

    async fn run(&self) -> Response {
        let now = Utc::now();
        let timer = RUNTIME.start_timer();
        let mut report = Report {
            time: now.to_rfc3339(),
            ..Report::default()
        };

        let response = match self.invoke().await {
            Ok((current_time, verified)) => {
                INVOCATIONS_TOTAL.with_label_values(&["success"]).inc();
                LAST_SUCCESS.set(now.timestamp());
                report.tls_verified = Some(verified);
                Response::ok(&current_time)
            }
            Err((stage, err)) => {
                let message = format!("{err:#}");
                eprintln!("{} - {} stage failed: {message}", stamp(), stage.label());
                STAGE_ERRORS.with_label_values(&[stage.label()]).inc();
                INVOCATIONS_TOTAL.with_label_values(&["error"]).inc();
                report.error = Some(message.clone());
                Response::error(&message)
            }
        };

        timer.observe_duration();
        report.status = response.status_code;
        report.runtime_ms = Utc::now().signed_duration_since(now).num_milliseconds();
        if let Ok(serialized) = serde_json::to_string(&report) {
            println!("{serialized}");
        }

        response
    }

    async fn invoke(&self) -> Result<(String, bool), (Stage, anyhow::Error)> {
        let creds = self
            .secrets
            .fetch_credentials()
            .await
            .map_err(|e| (Stage::Secrets, e))?;

        let (mut conn, verified) = self
            .acquire(&creds)
            .await
            .map_err(|e| (Stage::Connect, e))?;

        // The connection is released on both exits of the query stage,
        // keeping the proxy's connection count honest.
        let result = self.db.server_time(&mut conn).await;
        self.db.close(conn).await;

        let current_time = result.map_err(|e| (Stage::Query, e))?;
        Ok((current_time, verified))
    }

    /// Two-attempt connection policy: the configured TLS mode first, then,
    /// when the policy flag allows it, one retry with certificate
    /// verification disabled. The degraded retry is a deliberate
    /// availability trade-off for trust stores that do not carry the
    /// proxy's issuing CA, and it is always signalled: a warning line plus
    /// a dedicated counter.
    async fn acquire(&self, creds: &Credentials) -> anyhow::Result<(D::Conn, bool)> {
        match self.db.connect(creds, self.tls_mode).await {
            Ok(conn) => Ok((conn, self.tls_mode.is_verifying())),
            Err(first) if self.tls_mode.is_verifying() && self.tls_fallback => {
                eprintln!(
                    "{} - verified TLS connection failed, retrying without certificate \
                     verification: {first:#}",
                    stamp()
                );
                TLS_FALLBACKS.inc();
                let conn = self.db.connect(creds, TlsMode::Require).await?;
                Ok((conn, false))
            }
            Err(first) => Err(first),
        }
    }
}
