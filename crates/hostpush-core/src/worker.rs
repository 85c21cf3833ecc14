//! Host worker: connect + transfer for exactly one host

use std::sync::Arc;
use std::time::Instant;

use hostpush_exec::{ConnectCause, Connection, ConnectionError, Connector};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::TaskConfig;
use crate::event::TaskEvent;
use crate::outcome::HostOutcome;
use crate::spec::TaskSpec;
use crate::transfer::FileTransfer;

/// Runs one host from connection to terminal outcome
///
/// Never fails: every error becomes part of the returned `HostOutcome`.
pub struct HostWorker {
    spec: Arc<TaskSpec>,
    config: Arc<TaskConfig>,
    connector: Arc<dyn Connector>,
    cancel: CancellationToken,
    events: broadcast::Sender<TaskEvent>,
}

impl HostWorker {
    /// Create a worker sharing the task's spec, config and connector
    pub fn new(
        spec: Arc<TaskSpec>,
        config: Arc<TaskConfig>,
        connector: Arc<dyn Connector>,
        cancel: CancellationToken,
        events: broadcast::Sender<TaskEvent>,
    ) -> Self {
        Self {
            spec,
            config,
            connector,
            cancel,
            events,
        }
    }

    /// Push every file of the spec to `host`
    #[instrument(skip(self), fields(connector = self.connector.connector_type()))]
    pub async fn run(&self, host: &str) -> HostOutcome {
        let start = Instant::now();

        let _ = self.events.send(TaskEvent::HostStarted {
            host: host.to_string(),
        });

        let outcome = match self.connect(host).await {
            Ok(mut conn) => {
                let files = FileTransfer::new(&self.spec, &self.cancel)
                    .with_timeout(self.config.transfer_timeout())
                    .with_events(&self.events)
                    .run(host, conn.as_mut())
                    .await;
                conn.close().await;
                HostOutcome::from_files(host, files, start.elapsed())
            }
            Err(e) => {
                error!(host = %host, error = %e.cause, "connection failed");
                HostOutcome::failed(host, e.cause.to_string(), start.elapsed())
            }
        };

        info!(
            host = %host,
            status = %outcome.status,
            elapsed = ?outcome.elapsed,
            "host finished"
        );

        let _ = self.events.send(TaskEvent::HostFinished {
            host: host.to_string(),
            status: outcome.status,
        });

        outcome
    }

    /// Connect, retrying retryable failures up to the configured limit
    async fn connect(&self, host: &str) -> Result<Box<dyn Connection>, ConnectionError> {
        let mut attempt = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(ConnectionError::new(host, ConnectCause::Cancelled));
            }

            let result = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    Err(ConnectionError::new(host, ConnectCause::Cancelled))
                }
                result = self.connector.connect(host) => result,
            };

            match result {
                Err(e) if e.is_retryable() && attempt < self.config.connect_retries => {
                    attempt += 1;
                    warn!(
                        host = %host,
                        attempt = attempt,
                        max_retries = self.config.connect_retries,
                        error = %e.cause,
                        "connection failed, retrying"
                    );
                    tokio::select! {
                        () = self.cancel.cancelled() => {}
                        () = tokio::time::sleep(self.config.retry_delay()) => {}
                    }
                }
                other => return other,
            }
        }
    }
}
