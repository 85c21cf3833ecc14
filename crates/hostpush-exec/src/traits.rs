//! Connection provider traits

use std::path::Path;

use async_trait::async_trait;

use crate::error::{ConnectionError, TransferError};

/// Produces ready, authenticated connections
///
/// Stateless per call: every `connect` opens a fresh session.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `host`
    async fn connect(&self, host: &str) -> Result<Box<dyn Connection>, ConnectionError>;

    /// Short name for logging
    fn connector_type(&self) -> &'static str;
}

/// An open file-transfer session with one host
///
/// Sessions are used sequentially; callers never issue concurrent requests on
/// the same connection. Dropping a connection releases its network resources,
/// `close` additionally says goodbye to the server.
#[async_trait]
pub trait Connection: Send {
    /// Check whether `remote` already exists on the host
    async fn exists(&mut self, remote: &str) -> Result<bool, TransferError>;

    /// Copy the bytes of `local` to `remote`
    ///
    /// With `overwrite` the remote file is created or truncated; without it,
    /// creation fails if the file exists. Returns the number of bytes written.
    async fn upload(
        &mut self,
        local: &Path,
        remote: &str,
        overwrite: bool,
    ) -> Result<u64, TransferError>;

    /// Release the session
    async fn close(self: Box<Self>);
}
