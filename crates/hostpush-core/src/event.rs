//! Progress events published while a task runs

use serde::{Deserialize, Serialize};

use crate::outcome::{FileStatus, HostStatus};

/// Task progress event
///
/// Published on a broadcast channel; nobody has to listen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskEvent {
    /// A worker picked up a host
    HostStarted {
        host: String,
    },
    /// One file reached a terminal status
    FileFinished {
        host: String,
        remote_path: String,
        status: FileStatus,
    },
    /// A host reached its terminal outcome
    HostFinished {
        host: String,
        status: HostStatus,
    },
}
