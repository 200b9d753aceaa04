//! Per-transaction stage log.
//!
//! [`TransactionLog`] is handed to the transaction by its caller instead of
//! living in process-wide state, so two transactions run back to back (or in
//! the same test binary) never share a file handle or a logger name.
//!
//! Every record goes to `tracing` with `host` and `stage` fields. When a log
//! file is configured the same record is appended to it as one line:
//!
//! ```text
//! 2026-10-16T09:12:44.031Z INFO  [r1.example.net] lock: Taking configuration lock
//! ```

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::Level;

/// Transaction stage a log record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    Connect,
    Lock,
    Rollback,
    Diff,
    Check,
    Commit,
    Unlock,
    Close,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Connect => "connect",
            Stage::Lock => "lock",
            Stage::Rollback => "rollback",
            Stage::Diff => "diff",
            Stage::Check => "check",
            Stage::Commit => "commit",
            Stage::Unlock => "unlock",
            Stage::Close => "close",
        };
        f.write_str(name)
    }
}

/// Caller-supplied observability sink for one transaction
#[derive(Debug, Clone)]
pub struct TransactionLog {
    host: String,
    logfile: Option<PathBuf>,
}

impl TransactionLog {
    /// Log to `tracing` only
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            logfile: None,
        }
    }

    /// Log to `tracing` and append to `path`, creating it if needed.
    ///
    /// The file is opened once up front so an unwritable path is reported
    /// before any device is contacted.
    pub async fn with_logfile(
        host: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<Self, std::io::Error> {
        let path = path.as_ref().to_path_buf();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            host: host.into(),
            logfile: Some(path),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn logfile(&self) -> Option<&Path> {
        self.logfile.as_deref()
    }

    pub async fn info(&self, stage: Stage, message: &str) {
        self.record(Level::INFO, stage, message).await;
    }

    pub async fn warn(&self, stage: Stage, message: &str) {
        self.record(Level::WARN, stage, message).await;
    }

    pub async fn error(&self, stage: Stage, message: &str) {
        self.record(Level::ERROR, stage, message).await;
    }

    pub async fn debug(&self, stage: Stage, message: &str) {
        self.record(Level::DEBUG, stage, message).await;
    }

    async fn record(&self, level: Level, stage: Stage, message: &str) {
        if level == Level::ERROR {
            tracing::error!(host = %self.host, %stage, "{}", message);
        } else if level == Level::WARN {
            tracing::warn!(host = %self.host, %stage, "{}", message);
        } else if level == Level::INFO {
            tracing::info!(host = %self.host, %stage, "{}", message);
        } else {
            tracing::debug!(host = %self.host, %stage, "{}", message);
        }

        let Some(ref path) = self.logfile else {
            return;
        };

        // One record per line, even for multi-line device messages
        let flattened = message
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let line = format!(
            "{} {:<5} [{}] {}: {}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level.as_str(),
            self.host,
            stage,
            flattened
        );

        let written = async {
            let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            tracing::warn!("Failed to append to log file {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_logfile_lines_are_tagged_with_host() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rollback.log");

        let log = TransactionLog::with_logfile("r1.example.net", &path)
            .await
            .unwrap();
        log.info(Stage::Lock, "Taking configuration lock").await;
        log.error(Stage::Commit, "Unable to commit: boom").await;

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("INFO  [r1.example.net] lock: Taking configuration lock"));
        assert!(lines[1].contains("ERROR [r1.example.net] commit: Unable to commit: boom"));
    }

    #[tokio::test]
    async fn test_multiline_messages_stay_on_one_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rollback.log");

        let log = TransactionLog::with_logfile("r1", &path).await.unwrap();
        log.error(
            Stage::Lock,
            "Unable to lock configuration - will not rollback: configuration database locked by:\n  netops terminal pts/0\n",
        )
        .await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("locked by: netops terminal pts/0"));
    }

    #[tokio::test]
    async fn test_logfile_is_appended_not_truncated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rollback.log");
        std::fs::write(&path, "earlier run\n").unwrap();

        let log = TransactionLog::with_logfile("r1", &path).await.unwrap();
        log.info(Stage::Connect, "Connecting").await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("earlier run\n"));
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_sinks_do_not_interfere() {
        let temp_dir = TempDir::new().unwrap();
        let first_path = temp_dir.path().join("first.log");
        let second_path = temp_dir.path().join("second.log");

        let first = TransactionLog::with_logfile("r1", &first_path).await.unwrap();
        let second = TransactionLog::with_logfile("r2", &second_path).await.unwrap();
        first.info(Stage::Lock, "one").await;
        second.info(Stage::Lock, "two").await;

        let first_content = std::fs::read_to_string(&first_path).unwrap();
        let second_content = std::fs::read_to_string(&second_path).unwrap();
        assert!(first_content.contains("[r1]") && !first_content.contains("[r2]"));
        assert!(second_content.contains("[r2]") && !second_content.contains("[r1]"));
    }

    #[tokio::test]
    async fn test_unwritable_logfile_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing-dir").join("rollback.log");

        assert!(TransactionLog::with_logfile("r1", &path).await.is_err());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Check.to_string(), "check");
        assert_eq!(Stage::Unlock.to_string(), "unlock");
    }
}
