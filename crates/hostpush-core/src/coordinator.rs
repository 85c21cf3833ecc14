//! Task coordinator: runs one host worker per host under a concurrency bound
//!
//! Workers share nothing mutable. Each finished worker hands back exactly one
//! `HostOutcome`, which the coordinator files into that host's slot. The
//! report is built only after every slot is filled.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use hostpush_exec::{ConnectCause, Connector};
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::TaskConfig;
use crate::event::TaskEvent;
use crate::outcome::{HostOutcome, TaskReport};
use crate::spec::TaskSpec;
use crate::worker::HostWorker;

/// Fans a task out to all of its hosts
pub struct Coordinator {
    config: Arc<TaskConfig>,
    connector: Arc<dyn Connector>,
    cancel: CancellationToken,
    events: broadcast::Sender<TaskEvent>,
}

impl Coordinator {
    /// Create a coordinator
    ///
    /// Cancelling `cancel` stops hosts that have not started yet; hosts in
    /// flight stop at their next file boundary.
    pub fn new(
        config: Arc<TaskConfig>,
        connector: Arc<dyn Connector>,
        cancel: CancellationToken,
        events: broadcast::Sender<TaskEvent>,
    ) -> Self {
        Self {
            config,
            connector,
            cancel,
            events,
        }
    }

    /// Run the task to completion and report every host
    pub async fn execute(&self, spec: TaskSpec) -> TaskReport {
        let started_at = Utc::now();
        let start = Instant::now();

        let spec = Arc::new(spec);
        let hosts = spec.hosts().to_vec();
        let limit = self.config.effective_concurrency(hosts.len());

        // The deadline cancels only this task, never the caller's token
        let cancel = self.cancel.child_token();

        info!(
            kind = %spec.kind(),
            hosts = hosts.len(),
            files = spec.files().len(),
            dest = %spec.dest_dir(),
            concurrency = limit,
            "starting task"
        );

        let worker = Arc::new(HostWorker::new(
            spec.clone(),
            self.config.clone(),
            self.connector.clone(),
            cancel.clone(),
            self.events.clone(),
        ));
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut workers = JoinSet::new();

        for (index, host) in hosts.iter().cloned().enumerate() {
            let worker = worker.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();

            workers.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };

                let outcome = match permit {
                    Some(_permit) if !cancel.is_cancelled() => worker.run(&host).await,
                    _ => {
                        warn!(host = %host, "task cancelled before host started");
                        HostOutcome::failed(host, ConnectCause::Cancelled.to_string(), Duration::ZERO)
                    }
                };

                (index, outcome)
            });
        }

        let deadline = async {
            match self.config.task_timeout() {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        let mut slots: Vec<Option<HostOutcome>> = vec![None; hosts.len()];

        loop {
            tokio::select! {
                joined = workers.join_next() => match joined {
                    Some(Ok((index, outcome))) => slots[index] = Some(outcome),
                    Some(Err(e)) => error!(error = %e, "host worker panicked"),
                    None => break,
                },
                () = &mut deadline, if !cancel.is_cancelled() => {
                    warn!(timeout = ?self.config.task_timeout(), "task deadline reached, cancelling");
                    cancel.cancel();
                }
            }
        }

        let outcomes: Vec<HostOutcome> = slots
            .into_iter()
            .zip(hosts)
            .map(|(slot, host)| {
                slot.unwrap_or_else(|| HostOutcome::failed(host, "host worker panicked", Duration::ZERO))
            })
            .collect();

        let report = TaskReport {
            hosts: outcomes,
            started_at,
            elapsed: start.elapsed(),
        };

        info!(
            succeeded = report.succeeded(),
            partial = report.partial(),
            failed = report.failed(),
            elapsed = ?report.elapsed,
            "task finished"
        );

        report
    }
}
