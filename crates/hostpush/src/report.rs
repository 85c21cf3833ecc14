//! Report rendering for the terminal

use std::io::{self, Write};

use hostpush_core::{FileStatus, TaskEvent, TaskReport};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

/// Write a human-readable report
///
/// # Errors
/// Returns error if writing fails
pub fn write_text(report: &TaskReport, out: &mut impl Write) -> io::Result<()> {
    for host in &report.hosts {
        match &host.error {
            Some(error) => writeln!(out, "[{}] {}: {error}", host.host, host.status)?,
            None => writeln!(
                out,
                "[{}] {} ({:.2}s)",
                host.host,
                host.status,
                host.elapsed.as_secs_f64()
            )?,
        }

        for file in &host.files {
            let status = file.status.to_string();
            match file.status {
                FileStatus::Copied => writeln!(
                    out,
                    "    {status:<15} {} -> {} ({} bytes)",
                    file.path.display(),
                    file.remote_path,
                    file.bytes
                )?,
                FileStatus::SkippedExists => writeln!(
                    out,
                    "    {status:<15} {} -> {} (already exists)",
                    file.path.display(),
                    file.remote_path
                )?,
                FileStatus::Failed => writeln!(
                    out,
                    "    {status:<15} {} -> {}: {}",
                    file.path.display(),
                    file.remote_path,
                    file.error.as_deref().unwrap_or("unknown error")
                )?,
            }
        }
    }

    writeln!(
        out,
        "\nhosts: {} total, {} success, {} partial, {} failed (elapsed {:.2}s)",
        report.hosts.len(),
        report.succeeded(),
        report.partial(),
        report.failed(),
        report.elapsed.as_secs_f64()
    )
}

/// Write the report as pretty JSON
///
/// # Errors
/// Returns error if serialization or writing fails
pub fn write_json(report: &TaskReport, out: &mut impl Write) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)
}

/// Print a line per finished host until the event channel closes
///
/// Falling behind drops events but keeps printing. Returns the number of
/// hosts printed.
pub async fn write_progress(
    mut events: broadcast::Receiver<TaskEvent>,
    out: &mut impl Write,
) -> usize {
    let mut done = 0usize;
    loop {
        match events.recv().await {
            Ok(TaskEvent::HostFinished { host, status }) => {
                done += 1;
                if let Err(e) = writeln!(out, "[{done}] {host}: {status}") {
                    warn!(error = %e, "progress output failed");
                    return done;
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "progress output fell behind, events dropped");
            }
            Err(RecvError::Closed) => return done,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use hostpush_core::{FileResult, HostOutcome, HostStatus};

    use super::*;

    fn sample() -> TaskReport {
        TaskReport {
            hosts: vec![
                HostOutcome::from_files(
                    "h1",
                    vec![
                        FileResult::copied(PathBuf::from("foo.txt"), "/tmp/foo.txt".into(), 12),
                        FileResult::skipped(PathBuf::from("bar.txt"), "/tmp/bar.txt".into()),
                    ],
                    Duration::from_millis(250),
                ),
                HostOutcome::failed(
                    "h2",
                    "authentication failed: denied",
                    Duration::from_millis(5),
                ),
            ],
            started_at: chrono::Utc::now(),
            elapsed: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_text_report() {
        let mut out = Vec::new();
        write_text(&sample(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("[h1] success (0.25s)"));
        assert!(text.contains("copied          foo.txt -> /tmp/foo.txt (12 bytes)"));
        assert!(text.contains("skipped-exists  bar.txt -> /tmp/bar.txt (already exists)"));
        assert!(text.contains("[h2] failed: authentication failed: denied"));
        assert!(text.contains("hosts: 2 total, 1 success, 0 partial, 1 failed"));
    }

    #[test]
    fn test_json_report() {
        let mut out = Vec::new();
        write_json(&sample(), &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["hosts"][1]["status"], "failed");
        assert_eq!(value["hosts"][1]["files"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_progress_survives_lag() {
        let (tx, rx) = broadcast::channel(2);
        for i in 1..=5 {
            tx.send(TaskEvent::HostFinished {
                host: format!("h{i}"),
                status: HostStatus::Success,
            })
            .unwrap();
        }
        drop(tx);

        let mut out = Vec::new();
        let printed = write_progress(rx, &mut out).await;

        assert_eq!(printed, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[1] h4: success\n[2] h5: success\n"
        );
    }
}
