//! Per-file, per-host and per-task results

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal status of one file on one host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileStatus {
    /// Bytes were written to the remote path
    Copied,
    /// Remote path existed and overwriting was not allowed
    SkippedExists,
    /// Check or transfer failed
    Failed,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Copied => f.write_str("copied"),
            FileStatus::SkippedExists => f.write_str("skipped-exists"),
            FileStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Result for one (host, file) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResult {
    /// Local file path
    pub path: PathBuf,
    /// Remote path the file was (or would have been) written to
    pub remote_path: String,
    /// Outcome
    pub status: FileStatus,
    /// Bytes written (0 unless copied)
    pub bytes: u64,
    /// Error message when failed
    pub error: Option<String>,
}

impl FileResult {
    /// File copied successfully
    pub fn copied(path: PathBuf, remote_path: String, bytes: u64) -> Self {
        Self {
            path,
            remote_path,
            status: FileStatus::Copied,
            bytes,
            error: None,
        }
    }

    /// File left alone because it already exists
    pub fn skipped(path: PathBuf, remote_path: String) -> Self {
        Self {
            path,
            remote_path,
            status: FileStatus::SkippedExists,
            bytes: 0,
            error: None,
        }
    }

    /// File failed
    pub fn failed(path: PathBuf, remote_path: String, error: impl Into<String>) -> Self {
        Self {
            path,
            remote_path,
            status: FileStatus::Failed,
            bytes: 0,
            error: Some(error.into()),
        }
    }

    /// Whether this file counts as done (copied or skipped)
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status != FileStatus::Failed
    }
}

/// Terminal status of one host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    /// Every file copied or skipped
    Success,
    /// Some files done, some failed
    Partial,
    /// Nothing done
    Failed,
}

impl HostStatus {
    /// Aggregate file results into a host status
    ///
    /// An empty list is `Failed`: a host only has no results when its
    /// connection never came up.
    #[must_use]
    pub fn from_results(results: &[FileResult]) -> Self {
        let ok = results.iter().filter(|r| r.is_ok()).count();

        if ok == 0 {
            HostStatus::Failed
        } else if ok == results.len() {
            HostStatus::Success
        } else {
            HostStatus::Partial
        }
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostStatus::Success => f.write_str("success"),
            HostStatus::Partial => f.write_str("partial"),
            HostStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Terminal outcome for one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostOutcome {
    /// Host identifier
    pub host: String,
    /// Aggregate status
    pub status: HostStatus,
    /// Per-file results in input order; empty if the host was never connected
    pub files: Vec<FileResult>,
    /// Host-level error (connection failure, cancellation)
    pub error: Option<String>,
    /// Wall time spent on this host
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl HostOutcome {
    /// Outcome for a host whose files were attempted
    pub fn from_files(host: impl Into<String>, files: Vec<FileResult>, elapsed: Duration) -> Self {
        Self {
            host: host.into(),
            status: HostStatus::from_results(&files),
            files,
            error: None,
            elapsed,
        }
    }

    /// Outcome for a host that never got to transfer anything
    pub fn failed(host: impl Into<String>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            host: host.into(),
            status: HostStatus::Failed,
            files: Vec::new(),
            error: Some(error.into()),
            elapsed,
        }
    }
}

/// Aggregate of every host's outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    /// Outcomes in host input order
    pub hosts: Vec<HostOutcome>,
    /// When the task started
    pub started_at: DateTime<Utc>,
    /// Total wall time
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl TaskReport {
    /// Number of hosts with status `success`
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(HostStatus::Success)
    }

    /// Number of hosts with status `partial`
    #[must_use]
    pub fn partial(&self) -> usize {
        self.count(HostStatus::Partial)
    }

    /// Number of hosts with status `failed`
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(HostStatus::Failed)
    }

    /// The task succeeded only if every host did
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.hosts.iter().all(|h| h.status == HostStatus::Success)
    }

    /// Outcome for `host`, if it was part of the task
    #[must_use]
    pub fn host(&self, host: &str) -> Option<&HostOutcome> {
        self.hosts.iter().find(|h| h.host == host)
    }

    fn count(&self, status: HostStatus) -> usize {
        self.hosts.iter().filter(|h| h.status == status).count()
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
