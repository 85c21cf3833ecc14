//! Local "connections" backed by the local filesystem via `tokio::fs`

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::error::{ConnectionError, TransferError};
use crate::traits::{Connection, Connector};

/// Local connector
///
/// Serves hosts that are the local machine without going through SSH.
/// Remote paths resolve under `root` when one is set.
#[derive(Debug, Clone, Default)]
pub struct LocalConnector {
    root: Option<PathBuf>,
}

impl LocalConnector {
    /// Create a connector writing to the real local filesystem
    #[must_use]
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Create a connector that maps every remote path under `root`
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

#[async_trait]
impl Connector for LocalConnector {
    #[instrument(skip(self), level = "debug")]
    async fn connect(&self, host: &str) -> Result<Box<dyn Connection>, ConnectionError> {
        debug!(host = %host, "opening local connection");
        Ok(Box::new(LocalConnection {
            root: self.root.clone(),
        }))
    }

    fn connector_type(&self) -> &'static str {
        "local"
    }
}

/// Connection to the local filesystem
#[derive(Debug)]
pub struct LocalConnection {
    root: Option<PathBuf>,
}

impl LocalConnection {
    fn resolve(&self, remote: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(remote.trim_start_matches('/')),
            None => PathBuf::from(remote),
        }
    }
}

#[async_trait]
impl Connection for LocalConnection {
    async fn exists(&mut self, remote: &str) -> Result<bool, TransferError> {
        tokio::fs::try_exists(self.resolve(remote))
            .await
            .map_err(|e| TransferError::RemoteStat {
                path: remote.to_string(),
                message: e.to_string(),
            })
    }

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

        let mut target = tokio::fs::OpenOptions::new()
            .write(true)
            .create(overwrite)
            .truncate(overwrite)
            .create_new(!overwrite)
            .open(self.resolve(remote))
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
        target.flush().await.map_err(io_err)?;

        Ok(written)
    }

    async fn close(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_and_exists() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("foo.txt");
        std::fs::write(&src, b"hello\x00world").unwrap();

        let connector = LocalConnector::with_root(dst_dir.path());
        let mut conn = connector.connect("localhost").await.unwrap();

        assert!(!conn.exists("/foo.txt").await.unwrap());
        let written = conn.upload(&src, "/foo.txt", false).await.unwrap();
        assert_eq!(written, 11);
        assert!(conn.exists("/foo.txt").await.unwrap());
        conn.close().await;

        let copied = std::fs::read(dst_dir.path().join("foo.txt")).unwrap();
        assert_eq!(copied, b"hello\x00world");
    }

    #[tokio::test]
    async fn test_upload_truncates_existing() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("a.txt");
        std::fs::write(&src, b"new").unwrap();
        std::fs::write(dst_dir.path().join("a.txt"), b"much longer old content").unwrap();

        let mut conn = LocalConnector::with_root(dst_dir.path())
            .connect("localhost")
            .await
            .unwrap();
        conn.upload(&src, "/a.txt", true).await.unwrap();

        assert_eq!(std::fs::read(dst_dir.path().join("a.txt")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_exclusive_upload_refuses_existing() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("a.txt");
        std::fs::write(&src, b"new").unwrap();
        std::fs::write(dst_dir.path().join("a.txt"), b"old").unwrap();

        let mut conn = LocalConnector::with_root(dst_dir.path())
            .connect("localhost")
            .await
            .unwrap();
        let result = conn.upload(&src, "/a.txt", false).await;

        assert!(matches!(result, Err(TransferError::RemoteCreate { .. })));
        assert_eq!(std::fs::read(dst_dir.path().join("a.txt")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_missing_source_is_local_read_error() {
        let dst_dir = tempfile::tempdir().unwrap();
        let mut conn = LocalConnector::with_root(dst_dir.path())
            .connect("localhost")
            .await
            .unwrap();

        let result = conn.upload(Path::new("/nonexistent/file"), "/file", true).await;
        assert!(matches!(result, Err(TransferError::LocalRead { .. })));
    }
}
