//! Immutable task specification

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CoreError;

/// Direction of a file task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Local files to remote hosts
    Push,
    /// Remote files to the local machine
    Pull,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Push => f.write_str("push"),
            TaskKind::Pull => f.write_str("pull"),
        }
    }
}

/// Everything a task needs to know, fixed at start
///
/// Shared read-only (behind an `Arc`) by every host worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    kind: TaskKind,
    hosts: Vec<String>,
    files: Vec<PathBuf>,
    dest_dir: String,
    allow_overwrite: bool,
}

impl TaskSpec {
    /// Build a spec, validating its invariants
    ///
    /// Duplicate hosts are dropped, keeping the first occurrence.
    ///
    /// # Errors
    /// Returns `CoreError` if hosts or files are empty, a host identifier is
    /// blank, a file has no file name, or the destination is invalid
    pub fn new(
        kind: TaskKind,
        hosts: Vec<String>,
        files: Vec<PathBuf>,
        dest_dir: impl Into<String>,
        allow_overwrite: bool,
    ) -> Result<Self, CoreError> {
        let dest_dir = dest_dir.into();

        if hosts.is_empty() {
            return Err(CoreError::NoHosts);
        }
        if files.is_empty() {
            return Err(CoreError::NoFiles);
        }
        if dest_dir.trim().is_empty() || dest_dir.contains('\0') {
            return Err(CoreError::InvalidDestination(dest_dir));
        }
        if let Some(file) = files.iter().find(|f| f.file_name().is_none()) {
            return Err(CoreError::InvalidFile(file.display().to_string()));
        }

        let mut seen = HashSet::with_capacity(hosts.len());
        let mut unique = Vec::with_capacity(hosts.len());
        for host in hosts {
            let host = host.trim().to_string();
            if host.is_empty() {
                return Err(CoreError::ConfigError("empty host identifier".to_string()));
            }
            if seen.insert(host.clone()) {
                unique.push(host);
            } else {
                warn!(host = %host, "duplicate host ignored");
            }
        }

        Ok(Self {
            kind,
            hosts: unique,
            files,
            dest_dir,
            allow_overwrite,
        })
    }

    /// Task direction
    #[must_use]
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Target hosts, unique, in input order
    #[must_use]
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Local files, in input order
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Remote destination directory
    #[must_use]
    pub fn dest_dir(&self) -> &str {
        &self.dest_dir
    }

    /// Whether existing remote files may be replaced
    #[must_use]
    pub fn allow_overwrite(&self) -> bool {
        self.allow_overwrite
    }
}

/// Remote path of `file` inside `dest_dir`: `dest_dir/<basename>`
///
/// Returns `None` when `file` has no file name or the name is not valid
/// UTF-8, since a lossy rename could make two files share one remote path.
#[must_use]
pub fn remote_path(dest_dir: &str, file: &Path) -> Option<String> {
    let name = file.file_name()?.to_str()?;
    let dir = dest_dir.trim_end_matches('/');
    Some(format!("{dir}/{name}"))
}
