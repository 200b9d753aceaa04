//! Error taxonomy for the rollback transaction.

use crate::device::DeviceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Classification reported alongside every failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    #[serde(rename = "ValidationError")]
    Validation,
    #[serde(rename = "ConnectionError")]
    Connection,
    #[serde(rename = "LockError")]
    Lock,
    #[serde(rename = "RollbackError")]
    Rollback,
    #[serde(rename = "DiffWriteError")]
    DiffWrite,
    #[serde(rename = "CommitError")]
    Commit,
    #[serde(rename = "UnlockError")]
    Unlock,
    #[serde(rename = "UnexpectedError")]
    Unexpected,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Validation => "ValidationError",
            ErrorClass::Connection => "ConnectionError",
            ErrorClass::Lock => "LockError",
            ErrorClass::Rollback => "RollbackError",
            ErrorClass::DiffWrite => "DiffWriteError",
            ErrorClass::Commit => "CommitError",
            ErrorClass::Unlock => "UnlockError",
            ErrorClass::Unexpected => "UnexpectedError",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a device-backed failure was raised by the client or the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureOrigin {
    /// Rejected before reaching the device (bad argument, closed session)
    Local,
    /// Rejected by the device or lost in transport
    Remote,
}

impl fmt::Display for FailureOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureOrigin::Local => "client-side",
            FailureOrigin::Remote => "device-side",
        })
    }
}

/// Fatal transaction failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransactionError {
    #[error("Invalid rollback request: {0}")]
    Validation(String),

    #[error("Unable to connect to {host}: {source}")]
    Connection {
        host: String,
        #[source]
        source: DeviceError,
    },

    #[error("Unable to lock configuration - will not rollback: {0}")]
    Lock(#[source] DeviceError),

    #[error("Unable to rollback: {0}")]
    Rollback(#[source] DeviceError),

    #[error("Unable to commit: {0}")]
    Commit(#[source] DeviceError),

    #[error("Unable to unlock configuration: {0}")]
    Unlock(#[source] DeviceError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl TransactionError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TransactionError::Validation(_) => ErrorClass::Validation,
            TransactionError::Connection { .. } => ErrorClass::Connection,
            TransactionError::Lock(_) => ErrorClass::Lock,
            TransactionError::Rollback(_) => ErrorClass::Rollback,
            TransactionError::Commit(_) => ErrorClass::Commit,
            TransactionError::Unlock(_) => ErrorClass::Unlock,
            TransactionError::Unexpected(_) => ErrorClass::Unexpected,
        }
    }

    /// Underlying device error, when there is one
    pub fn device_error(&self) -> Option<&DeviceError> {
        match self {
            TransactionError::Connection { source, .. } => Some(source),
            TransactionError::Lock(e)
            | TransactionError::Rollback(e)
            | TransactionError::Commit(e)
            | TransactionError::Unlock(e) => Some(e),
            TransactionError::Validation(_) | TransactionError::Unexpected(_) => None,
        }
    }

    pub fn origin(&self) -> Option<FailureOrigin> {
        self.device_error().map(|e| {
            if e.is_local() {
                FailureOrigin::Local
            } else {
                FailureOrigin::Remote
            }
        })
    }
}

/// Diff artifact could not be written. Logged, never fatal.
#[derive(Debug, thiserror::Error)]
#[error("Unable to write diffs file {}: {source}", .path.display())]
pub struct DiffWriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl DiffWriteError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::DiffWrite
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_device_detail() {
        let lock = TransactionError::Lock(DeviceError::Rpc(
            "configuration database locked by netops".to_string(),
        ));
        assert_eq!(
            lock.to_string(),
            "Unable to lock configuration - will not rollback: configuration database locked by netops"
        );

        let connect = TransactionError::Connection {
            host: "r1".to_string(),
            source: DeviceError::Connect("Connection refused".to_string()),
        };
        assert_eq!(connect.to_string(), "Unable to connect to r1: Connection refused");
        assert_eq!(connect.class(), ErrorClass::Connection);
    }

    #[test]
    fn test_rollback_origin_is_preserved() {
        let local = TransactionError::Rollback(DeviceError::InvalidArgument("bad".to_string()));
        let remote = TransactionError::Rollback(DeviceError::Rpc("missing".to_string()));

        assert_eq!(local.class(), remote.class());
        assert_eq!(local.origin(), Some(FailureOrigin::Local));
        assert_eq!(remote.origin(), Some(FailureOrigin::Remote));
        assert_eq!(TransactionError::Validation("x".to_string()).origin(), None);
        assert_eq!(FailureOrigin::Local.to_string(), "client-side");
        assert_eq!(FailureOrigin::Remote.to_string(), "device-side");
    }

    #[test]
    fn test_error_class_names() {
        assert_eq!(ErrorClass::Unlock.to_string(), "UnlockError");
        assert_eq!(
            serde_json::to_string(&ErrorClass::Validation).unwrap(),
            "\"ValidationError\""
        );
    }

    #[test]
    fn test_diff_write_error_message() {
        let err = DiffWriteError {
            path: PathBuf::from("/readonly/diff.txt"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().starts_with("Unable to write diffs file /readonly/diff.txt"));
        assert_eq!(err.class(), ErrorClass::DiffWrite);
    }
}
