//! Core error types for hostpush-core

use thiserror::Error;

use crate::spec::TaskKind;

/// Task-scoped errors
///
/// These fail `Task::start` before any host is contacted. Host- and
/// file-scoped failures never surface here; they are recorded in the report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No hosts were given
    #[error("configuration error: no target hosts")]
    NoHosts,

    /// No files were given
    #[error("configuration error: no files to copy")]
    NoFiles,

    /// Destination path is empty or malformed
    #[error("configuration error: invalid destination path '{0}'")]
    InvalidDestination(String),

    /// A local path has no usable file name
    #[error("configuration error: invalid file path '{0}'")]
    InvalidFile(String),

    /// Task kind has no engine
    #[error("configuration error: {0} tasks are not supported")]
    Unsupported(TaskKind),

    /// Invalid task configuration value
    #[error("configuration error: {0}")]
    ConfigError(String),
}
