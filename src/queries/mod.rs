pub mod mysql;

use crate::{secrets::Credentials, tls::TlsMode};
use anyhow::Result;

/// Database collaborator: one connection, one diagnostic query.
///
/// The handler drives the connection policy (which TLS mode, whether to
/// retry unverified) through this seam so it can be exercised with test
/// doubles.
pub trait Database {
    type Conn: Send;

    /// Open a single connection with the given TLS mode, bounded by the
    /// configured connect timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established within the
    /// timeout
    fn connect(
        &self,
        creds: &Credentials,
        mode: TlsMode,
    ) -> impl Future<Output = Result<Self::Conn>> + Send;

    /// Run the diagnostic query and return the server's current time as a
    /// string
    ///
    /// # Errors
    ///
    /// Returns an error if the query or the row fetch fails
    fn server_time(&self, conn: &mut Self::Conn) -> impl Future<Output = Result<String>> + Send;

    /// Gracefully close the connection; best effort
    fn close(&self, conn: Self::Conn) -> impl Future<Output = ()> + Send;
}
