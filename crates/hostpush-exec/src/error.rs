//! Error types for hostpush-exec

use std::time::Duration;

use thiserror::Error;

/// Failure to produce a ready connection for one host
#[derive(Error, Debug, Clone)]
#[error("{host}: {cause}")]
pub struct ConnectionError {
    /// Host identifier as given by the caller
    pub host: String,
    /// What went wrong
    pub cause: ConnectCause,
}

impl ConnectionError {
    /// Create a new connection error for `host`
    pub fn new(host: impl Into<String>, cause: ConnectCause) -> Self {
        Self {
            host: host.into(),
            cause,
        }
    }

    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.cause.is_retryable()
    }
}

/// Reason a connection could not be established
#[derive(Error, Debug, Clone)]
pub enum ConnectCause {
    /// Host could not be reached or the SSH handshake failed
    #[error("connection failed: {0}")]
    Unreachable(String),

    /// Server rejected our credentials
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Connect + authenticate did not finish in time
    #[error("connection timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// Server host key rejected
    #[error("host key verification failed: {0}")]
    HostKeyRejected(String),

    /// SSH key error
    #[error("SSH key error: {0}")]
    SshKeyError(String),

    /// SFTP subsystem could not be started
    #[error("SFTP subsystem unavailable: {0}")]
    Subsystem(String),

    /// Invalid host identifier or connection parameters
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    /// Task was cancelled before the connection was ready
    #[error("cancelled")]
    Cancelled,
}

impl ConnectCause {
    /// Check if cause is worth another attempt
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConnectCause::Unreachable(_) | ConnectCause::Timeout { .. }
        )
    }
}

/// Errors scoped to a single file on a single host
#[derive(Error, Debug, Clone)]
pub enum TransferError {
    /// Local source file could not be opened or read
    #[error("cannot read local file {path}: {message}")]
    LocalRead {
        /// Local path
        path: String,
        /// Underlying error
        message: String,
    },

    /// Remote existence check failed
    #[error("cannot stat {path}: {message}")]
    RemoteStat {
        /// Remote path
        path: String,
        /// Underlying error
        message: String,
    },

    /// Remote file could not be created or truncated
    #[error("cannot create {path}: {message}")]
    RemoteCreate {
        /// Remote path
        path: String,
        /// Underlying error
        message: String,
    },

    /// Stream broke mid-transfer
    #[error("I/O error writing {path}: {message}")]
    Io {
        /// Remote path
        path: String,
        /// Underlying error
        message: String,
    },

    /// Destination could not be formed from the inputs
    #[error("invalid remote path: {0}")]
    InvalidPath(String),

    /// Upload did not finish in time
    #[error("transfer timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// Skipped because the task was cancelled
    #[error("cancelled")]
    Cancelled,
}
