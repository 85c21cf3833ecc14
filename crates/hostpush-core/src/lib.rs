//! hostpush-core: Multi-host file push engine
//!
//! Takes a host list, local files, a destination and an overwrite policy,
//! pushes the files to every host concurrently and reports each host's
//! outcome independently.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod outcome;
pub mod spec;
pub mod task;
pub mod transfer;
pub mod worker;

pub use config::{DEFAULT_CONCURRENCY_CEILING, TaskConfig};
pub use coordinator::Coordinator;
pub use error::CoreError;
pub use event::TaskEvent;
pub use outcome::{FileResult, FileStatus, HostOutcome, HostStatus, TaskReport};
pub use spec::{TaskKind, TaskSpec, remote_path};
pub use task::Task;
pub use transfer::FileTransfer;
pub use worker::HostWorker;
