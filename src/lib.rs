//! dbping - Lambda function that checks database availability through an
//! RDS proxy.
//!
//! Each invocation fetches the database credentials from Secrets Manager,
//! opens one TLS connection to the proxy endpoint (optionally retrying once
//! with certificate verification disabled), runs `SELECT NOW()` and returns
//! an API Gateway style JSON response.

pub mod config;
pub mod handler;
pub mod metrics;
pub mod queries;
pub mod secrets;
pub mod tls;

pub use config::Config;
pub use handler::{Handler, Response};
