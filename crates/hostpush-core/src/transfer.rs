//! File transfer unit: copies a task's files over one open connection

use std::path::Path;
use std::time::Duration;

use hostpush_exec::{Connection, TransferError};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::event::TaskEvent;
use crate::outcome::FileResult;
use crate::spec::{TaskSpec, remote_path};

/// Copies every file of a spec to one host, sequentially
pub struct FileTransfer<'a> {
    spec: &'a TaskSpec,
    timeout: Option<Duration>,
    cancel: &'a CancellationToken,
    events: Option<&'a broadcast::Sender<TaskEvent>>,
}

impl<'a> FileTransfer<'a> {
    /// Create a transfer for `spec`, checking `cancel` between files
    pub fn new(spec: &'a TaskSpec, cancel: &'a CancellationToken) -> Self {
        Self {
            spec,
            timeout: None,
            cancel,
            events: None,
        }
    }

    /// Fail any single upload that takes longer than `limit`
    #[must_use]
    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    /// Publish a `FileFinished` event per file
    #[must_use]
    pub fn with_events(mut self, events: &'a broadcast::Sender<TaskEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Transfer every file in order, one result per file
    ///
    /// A failing file never stops the files after it. Once the task is
    /// cancelled, files not yet started are recorded as failed.
    pub async fn run(&self, host: &str, conn: &mut dyn Connection) -> Vec<FileResult> {
        let mut results = Vec::with_capacity(self.spec.files().len());

        for file in self.spec.files() {
            let result = self.transfer_one(conn, file).await;

            match &result.error {
                Some(error) => warn!(
                    host = %host,
                    file = %result.path.display(),
                    error = %error,
                    "file transfer failed"
                ),
                None => info!(
                    host = %host,
                    file = %result.path.display(),
                    remote = %result.remote_path,
                    status = %result.status,
                    "file done"
                ),
            }

            if let Some(events) = self.events {
                let _ = events.send(TaskEvent::FileFinished {
                    host: host.to_string(),
                    remote_path: result.remote_path.clone(),
                    status: result.status,
                });
            }

            results.push(result);
        }

        results
    }

    async fn transfer_one(&self, conn: &mut dyn Connection, file: &Path) -> FileResult {
        let path = file.to_path_buf();

        let Some(remote) = remote_path(self.spec.dest_dir(), file) else {
            let error = TransferError::InvalidPath(file.display().to_string());
            return FileResult::failed(path, String::new(), error.to_string());
        };

        if self.cancel.is_cancelled() {
            return FileResult::failed(path, remote, TransferError::Cancelled.to_string());
        }

        match conn.exists(&remote).await {
            Ok(true) if !self.spec.allow_overwrite() => {
                debug!(remote = %remote, "remote file exists, skipping");
                return FileResult::skipped(path, remote);
            }
            Ok(_) => {}
            Err(e) => return FileResult::failed(path, remote, e.to_string()),
        }

        let upload = conn.upload(file, &remote, self.spec.allow_overwrite());
        let outcome = match self.timeout {
            Some(limit) => timeout(limit, upload)
                .await
                .unwrap_or(Err(TransferError::Timeout { timeout: limit })),
            None => upload.await,
        };

        match outcome {
            Ok(bytes) => FileResult::copied(path, remote, bytes),
            Err(e) => FileResult::failed(path, remote, e.to_string()),
        }
    }
}
