//! hostpush-exec: Connection provider
//!
//! Opens authenticated file-transfer sessions to remote hosts (SSH/SFTP) or
//! to the local machine, behind the `Connector`/`Connection` traits.

pub mod error;
pub mod keys;
pub mod local;
pub mod params;
pub mod ssh;
pub mod traits;

pub use error::{ConnectCause, ConnectionError, TransferError};
pub use keys::{KeyError, KeySource, ResolvedKey};
pub use local::{LocalConnection, LocalConnector};
pub use params::{ConnectionParams, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, HostAddr};
pub use ssh::{SftpConnection, SshConnector};
pub use traits::{Connection, Connector};
