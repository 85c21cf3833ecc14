//! Task façade: the object a command builds, configures and starts

use std::path::PathBuf;
use std::sync::Arc;

use hostpush_exec::Connector;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::TaskConfig;
use crate::coordinator::Coordinator;
use crate::error::CoreError;
use crate::event::TaskEvent;
use crate::outcome::TaskReport;
use crate::spec::{TaskKind, TaskSpec};

/// A file task under construction
///
/// ```no_run
/// # use std::sync::Arc;
/// # use hostpush_core::{Task, TaskConfig, TaskKind};
/// # use hostpush_exec::LocalConnector;
/// # async fn demo() -> Result<(), hostpush_core::CoreError> {
/// let mut task = Task::new(TaskKind::Push, TaskConfig::default(), Arc::new(LocalConnector::new()));
/// task.set_hosts(vec!["localhost".to_string()]);
/// task.set_copy_files(vec!["./foo.txt".into()]);
/// task.set_file_options("/tmp", false);
/// let report = task.start().await?;
/// assert!(report.is_success());
/// # Ok(())
/// # }
/// ```
pub struct Task {
    kind: TaskKind,
    config: Arc<TaskConfig>,
    connector: Arc<dyn Connector>,
    hosts: Vec<String>,
    files: Vec<PathBuf>,
    dest_path: String,
    allow_overwrite: bool,
    cancel: CancellationToken,
    event_tx: broadcast::Sender<TaskEvent>,
}

impl Task {
    /// Create a task of `kind` using `connector` for every host
    pub fn new(kind: TaskKind, config: TaskConfig, connector: Arc<dyn Connector>) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));

        Self {
            kind,
            config: Arc::new(config),
            connector,
            hosts: Vec::new(),
            files: Vec::new(),
            dest_path: String::new(),
            allow_overwrite: false,
            cancel: CancellationToken::new(),
            event_tx,
        }
    }

    /// Set target hosts
    pub fn set_hosts(&mut self, hosts: Vec<String>) {
        self.hosts = hosts;
    }

    /// Set local files to copy
    pub fn set_copy_files(&mut self, files: Vec<PathBuf>) {
        self.files = files;
    }

    /// Set remote destination directory and overwrite policy
    pub fn set_file_options(&mut self, dest_path: impl Into<String>, allow_overwrite: bool) {
        self.dest_path = dest_path.into();
        self.allow_overwrite = allow_overwrite;
    }

    /// Token that cancels the task when triggered
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Get event receiver for progress reporting
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.event_tx.subscribe()
    }

    /// Validate the assembled task and run it to completion
    ///
    /// Returns once every host has a terminal outcome. Host and file failures
    /// are part of the report, not errors.
    ///
    /// # Errors
    /// Returns `CoreError` if the task is invalid; no host is contacted then
    pub async fn start(&self) -> Result<TaskReport, CoreError> {
        if self.kind != TaskKind::Push {
            return Err(CoreError::Unsupported(self.kind));
        }

        let spec = TaskSpec::new(
            self.kind,
            self.hosts.clone(),
            self.files.clone(),
            self.dest_path.clone(),
            self.allow_overwrite,
        )?;

        info!(
            kind = %self.kind,
            connector = self.connector.connector_type(),
            "task validated"
        );

        let coordinator = Coordinator::new(
            self.config.clone(),
            self.connector.clone(),
            self.cancel.clone(),
            self.event_tx.clone(),
        );

        Ok(coordinator.execute(spec).await)
    }
}
