//! SSH/SFTP connections using the russh and russh-sftp crates

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use russh::client::AuthResult;
#[cfg(unix)]
use russh::keys::agent::client::AgentClient;
use russh::keys::ssh_key;
use russh::keys::{PrivateKeyWithHashAlg, check_known_hosts};
use russh::{Disconnect, client};
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::error::{ConnectCause, ConnectionError, TransferError};
use crate::keys::{KeyError, ResolvedKey};
use crate::params::{ConnectionParams, HostAddr};
use crate::traits::{Connection, Connector};

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler {
    host: String,
    port: u16,
    strict: bool,
}

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        if !self.strict {
            // Like StrictHostKeyChecking=no
            return Ok(true);
        }

        match check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => Ok(true),
            Ok(false) => {
                warn!(host = %self.host, "server key not in known_hosts");
                Ok(false)
            }
            Err(e) => {
                warn!(host = %self.host, error = %e, "known_hosts check failed");
                Ok(false)
            }
        }
    }
}

/// Connector that opens an SFTP session over SSH per host
pub struct SshConnector {
    /// Shared connection settings
    params: ConnectionParams,
    /// Resolved credentials
    key: ResolvedKey,
    /// russh client configuration
    config: Arc<client::Config>,
}

impl std::fmt::Debug for SshConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnector")
            .field("params", &self.params)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl SshConnector {
    /// Create a new SSH connector
    ///
    /// Credentials are resolved here, once for all hosts.
    ///
    /// # Errors
    /// Returns `KeyError` if key resolution fails
    pub fn new(params: ConnectionParams) -> Result<Self, KeyError> {
        let key = params.auth.resolve()?;

        Ok(Self {
            params,
            key,
            config: Arc::new(client::Config::default()),
        })
    }

    /// Connect, authenticate and start the SFTP subsystem
    async fn establish(&self, addr: &HostAddr) -> Result<SftpConnection, ConnectCause> {
        info!(
            host = %addr.host,
            port = addr.port,
            user = %addr.user,
            "connecting to SSH"
        );

        let handler = SshClientHandler {
            host: addr.host.clone(),
            port: addr.port,
            strict: self.params.strict_host_key_checking,
        };

        let mut session = client::connect(self.config.clone(), (&addr.host[..], addr.port), handler)
            .await
            .map_err(|e| match e {
                russh::Error::UnknownKey => ConnectCause::HostKeyRejected(
                    "server key unknown or changed, check known_hosts".to_string(),
                ),
                other => ConnectCause::Unreachable(other.to_string()),
            })?;

        self.authenticate(&mut session, &addr.user).await?;

        debug!(host = %addr.host, "SSH authenticated, starting SFTP subsystem");

        let channel = session
            .channel_open_session()
            .await
            .map_err(|e| ConnectCause::Subsystem(e.to_string()))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| ConnectCause::Subsystem(e.to_string()))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| ConnectCause::Subsystem(e.to_string()))?;

        info!(host = %addr.host, "SFTP session ready");

        Ok(SftpConnection {
            host: addr.host.clone(),
            session,
            sftp,
        })
    }

    async fn authenticate(
        &self,
        session: &mut client::Handle<SshClientHandler>,
        user: &str,
    ) -> Result<(), ConnectCause> {
        let auth_res = match &self.key {
            ResolvedKey::Key(key) => {
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .ok()
                    .flatten()
                    .flatten();
                session
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key.clone(), hash_alg))
                    .await
                    .map_err(|e| ConnectCause::AuthenticationFailed(e.to_string()))?
            }
            ResolvedKey::Password(password) => session
                .authenticate_password(user, password)
                .await
                .map_err(|e| ConnectCause::AuthenticationFailed(e.to_string()))?,
            ResolvedKey::Agent => authenticate_with_agent(session, user).await?,
        };

        if !auth_res.success() {
            return Err(ConnectCause::AuthenticationFailed(format!(
                "server rejected credentials for user '{user}'"
            )));
        }

        Ok(())
    }
}

/// Try every identity the SSH agent holds until the server accepts one
#[cfg(unix)]
async fn authenticate_with_agent(
    session: &mut client::Handle<SshClientHandler>,
    user: &str,
) -> Result<AuthResult, ConnectCause> {
    let mut agent = AgentClient::connect_env()
        .await
        .map_err(|e| ConnectCause::AuthenticationFailed(format!("SSH agent unavailable: {e}")))?;
    let identities = agent
        .request_identities()
        .await
        .map_err(|e| ConnectCause::AuthenticationFailed(format!("SSH agent: {e}")))?;

    if identities.is_empty() {
        return Err(ConnectCause::AuthenticationFailed(
            "SSH agent holds no identities".to_string(),
        ));
    }

    let hash_alg = session.best_supported_rsa_hash().await.ok().flatten().flatten();

    for key in identities {
        debug!(user = %user, algorithm = %key.algorithm().as_str(), "trying agent identity");
        let result = session
            .authenticate_publickey_with(user, key, hash_alg, &mut agent)
            .await
            .map_err(|e| ConnectCause::AuthenticationFailed(e.to_string()))?;
        if result.success() {
            return Ok(result);
        }
    }

    Err(ConnectCause::AuthenticationFailed(format!(
        "server rejected every SSH agent identity for user '{user}'"
    )))
}

#[cfg(not(unix))]
async fn authenticate_with_agent(
    _session: &mut client::Handle<SshClientHandler>,
    _user: &str,
) -> Result<AuthResult, ConnectCause> {
    Err(ConnectCause::AuthenticationFailed(
        "SSH agent authentication is only supported on unix".to_string(),
    ))
}

#[async_trait]
impl Connector for SshConnector {
    #[instrument(skip(self), fields(connector = "ssh"))]
    async fn connect(&self, host: &str) -> Result<Box<dyn Connection>, ConnectionError> {
        let addr = HostAddr::parse(host, &self.params).map_err(|c| ConnectionError::new(host, c))?;
        let limit = self.params.connect_timeout;

        // Dropping a half-built session on timeout closes its socket
        match timeout(limit, self.establish(&addr)).await {
            Ok(Ok(conn)) => Ok(Box::new(conn)),
            Ok(Err(cause)) => Err(ConnectionError::new(host, cause)),
            Err(_) => Err(ConnectionError::new(
                host,
                ConnectCause::Timeout { timeout: limit },
            )),
        }
    }

    fn connector_type(&self) -> &'static str {
        "ssh"
    }
}

/// Open SFTP session with one host
pub struct SftpConnection {
    host: String,
    session: client::Handle<SshClientHandler>,
    sftp: SftpSession,
}

#[async_trait]
impl Connection for SftpConnection {
    async fn exists(&mut self, remote: &str) -> Result<bool, TransferError> {
        self.sftp
            .try_exists(remote)
            .await
            .map_err(|e| TransferError::RemoteStat {
                path: remote.to_string(),
                message: e.to_string(),
            })
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn upload(
        &mut self,
        local: &Path,
        remote: &str,
        overwrite: bool,
    ) -> Result<u64, TransferError> {
        let mut source = tokio::fs::File::open(local)
            .await
            .map_err(|e| TransferError::LocalRead {
                path: local.display().to_string(),
                message: e.to_string(),
            })?;

        let flags = if overwrite {
            OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE
        } else {
            OpenFlags::CREATE | OpenFlags::EXCLUDE | OpenFlags::WRITE
        };
        let mut target = self
            .sftp
            .open_with_flags(remote, flags)
            .await
            .map_err(|e| TransferError::RemoteCreate {
                path: remote.to_string(),
                message: e.to_string(),
            })?;

        let io_err = |e: std::io::Error| TransferError::Io {
            path: remote.to_string(),
            message: e.to_string(),
        };

        let written = tokio::io::copy(&mut source, &mut target)
            .await
            .map_err(io_err)?;
        target.shutdown().await.map_err(io_err)?;

        debug!(remote = %remote, bytes = written, "upload finished");

        Ok(written)
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.sftp.close().await {
            debug!(host = %self.host, error = %e, "SFTP close failed");
        }
        if let Err(e) = self
            .session
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!(host = %self.host, error = %e, "SSH disconnect failed");
        }
        info!(host = %self.host, "SSH disconnected");
    }
}
