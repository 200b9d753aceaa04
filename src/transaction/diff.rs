//! Pending diff retrieval and the optional diff artifact.

use super::error::{DiffWriteError, TransactionError};
use super::session::SessionGuard;
use crate::logging::{Stage, TransactionLog};
use std::path::Path;

pub struct DiffCapturer;

impl DiffCapturer {
    /// Fetch the candidate diff and, when a path is given and the diff is
    /// non-empty, write it there verbatim.
    ///
    /// Retrieving the diff is a device call issued while restoring the
    /// snapshot, so its failure is a [`TransactionError::Rollback`]. Writing
    /// the artifact is best effort: a [`DiffWriteError`] is logged and the
    /// diff is still returned.
    pub async fn capture(
        session: &mut SessionGuard,
        diffs_file: Option<&Path>,
        log: &TransactionLog,
    ) -> Result<Option<String>, TransactionError> {
        let device = session.session(Stage::Diff)?;
        let diff = match device.diff().await {
            Ok(diff) => diff,
            Err(e) => {
                let err = TransactionError::Rollback(e);
                log.error(Stage::Diff, &err.to_string()).await;
                return Err(err);
            }
        };

        let Some(text) = diff else {
            log.info(Stage::Diff, "No configuration differences").await;
            return Ok(None);
        };

        log.info(
            Stage::Diff,
            &format!("Candidate differs in {} line(s)", text.lines().count()),
        )
        .await;
        tracing::debug!(host = %log.host(), "Pending changes:\n{}", text.trim_end());

        if let Some(path) = diffs_file {
            match Self::persist(path, &text).await {
                Ok(()) => {
                    log.info(Stage::Diff, &format!("Wrote diff to {}", path.display()))
                        .await
                }
                Err(e) => log.warn(Stage::Diff, &format!("{} ({})", e, e.class())).await,
            }
        }

        Ok(Some(text))
    }

    /// Create or truncate `path` and write `text` exactly
    pub async fn persist(path: &Path, text: &str) -> Result<(), DiffWriteError> {
        tokio::fs::write(path, text)
            .await
            .map_err(|source| DiffWriteError {
                path: path.to_path_buf(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_persist_truncates_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("diffs.txt");
        std::fs::write(&path, "stale content that is much longer than the diff\n").unwrap();

        DiffCapturer::persist(&path, "[edit]\n+ foo;\n").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[edit]\n+ foo;\n");
    }

    #[tokio::test]
    async fn test_persist_reports_path_on_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("no-such-dir").join("diffs.txt");

        let err = DiffCapturer::persist(&path, "diff").await.unwrap_err();
        assert_eq!(err.path, path);
        assert_eq!(err.source.kind(), std::io::ErrorKind::NotFound);
    }
}
