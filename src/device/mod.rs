//! # Device Client Abstraction
//!
//! The transaction core never talks to a wire protocol directly. It drives a
//! [`DeviceClient`] to open one [`DeviceSession`] and then issues configuration
//! operations against that session in order.
//!
//! ## Core Components
//!
//! - **[`DeviceClient`]**: builds an unopened session from [`ConnectionParams`]
//! - **[`DeviceSession`]**: open, lock/unlock, rollback, diff, commit-check, commit, close
//! - **[`CommitOptions`]**: optional comment and confirmed-commit timeout
//! - **[`DeviceError`]**: failure modes reported by a client implementation
//!
//! ## Implementations
//!
//! - **[`netconf::NetconfClient`]**: Junos NETCONF over the `ssh` subsystem
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use junos_rollback::device::{CommitOptions, DeviceClient, netconf::NetconfClient};
//! use junos_rollback::transaction::ConnectionParams;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = NetconfClient::new(Default::default());
//!     let params = ConnectionParams::new("router1.example.net", "netops");
//!
//!     let mut session = client.session(&params);
//!     session.open().await?;
//!     session.lock().await?;
//!     session.rollback(1).await?;
//!     if let Some(diff) = session.diff().await? {
//!         println!("{}", diff);
//!     }
//!     session.commit_check().await?;
//!     session.unlock().await?;
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

use crate::transaction::ConnectionParams;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Junos NETCONF client driven through the system `ssh` binary.
pub mod netconf;

/// NETCONF RPC construction and reply parsing.
pub mod rpc;

pub use netconf::{NetconfClient, NetconfConfig, NetconfSession};

/// Options accompanying a real commit.
///
/// Only the fields that were actually supplied are sent to the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOptions {
    /// Commit log comment
    pub comment: Option<String>,
    /// Confirmed-commit window in minutes
    pub confirm: Option<u32>,
}

impl CommitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_confirm(mut self, minutes: u32) -> Self {
        self.confirm = Some(minutes);
        self
    }
}

/// Errors reported by a device client
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeviceError {
    /// Session could not be established
    #[error("{0}")]
    Connect(String),

    /// Request rejected by the client before it reached the device
    #[error("{0}")]
    InvalidArgument(String),

    /// Device answered with an rpc-error
    #[error("{0}")]
    Rpc(String),

    /// Transport failed mid-session
    #[error("transport error: {0}")]
    Transport(String),

    /// No reply within the configured window
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Operation issued against a session that is already closed
    #[error("session is closed")]
    SessionClosed,
}

impl DeviceError {
    /// True when the failure was raised locally rather than by the device.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::SessionClosed)
    }
}

impl From<std::io::Error> for DeviceError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Builds sessions against a single device.
pub trait DeviceClient: Send + Sync {
    /// Unopened session handle; no I/O happens until [`DeviceSession::open`]
    fn session(&self, params: &ConnectionParams) -> Box<dyn DeviceSession>;

    /// Client name for logging
    fn client_name(&self) -> &'static str;
}

/// One configuration-management session.
///
/// Calls are issued strictly in sequence by the transaction runner.
/// [`close`](DeviceSession::close) must be safe to call on a session that was
/// never opened, failed to open, or is already closed.
#[async_trait]
pub trait DeviceSession: Send {
    /// Connect and authenticate
    async fn open(&mut self) -> Result<(), DeviceError>;

    /// Take the exclusive configuration lock
    async fn lock(&mut self) -> Result<(), DeviceError>;

    /// Release the configuration lock
    async fn unlock(&mut self) -> Result<(), DeviceError>;

    /// Load rollback snapshot `id` into the candidate configuration
    async fn rollback(&mut self, id: u8) -> Result<(), DeviceError>;

    /// Candidate vs. active configuration diff, `None` when nothing is pending
    async fn diff(&mut self) -> Result<Option<String>, DeviceError>;

    /// Validate the candidate configuration without activating it
    async fn commit_check(&mut self) -> Result<(), DeviceError>;

    /// Activate the candidate configuration
    async fn commit(&mut self, options: &CommitOptions) -> Result<(), DeviceError>;

    /// Terminate the session
    async fn close(&mut self) -> Result<(), DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_options_builder() {
        let options = CommitOptions::new()
            .with_comment("Rolled back by Ansible")
            .with_confirm(5);

        assert_eq!(options.comment.as_deref(), Some("Rolled back by Ansible"));
        assert_eq!(options.confirm, Some(5));
        assert!(CommitOptions::new().confirm.is_none());
    }

    #[test]
    fn test_device_error_locality() {
        assert!(DeviceError::InvalidArgument("bad id".to_string()).is_local());
        assert!(DeviceError::SessionClosed.is_local());
        assert!(!DeviceError::Rpc("no such rollback".to_string()).is_local());
        assert!(!DeviceError::Timeout(Duration::from_secs(1)).is_local());
    }

    #[test]
    fn test_device_error_display_keeps_detail() {
        let err = DeviceError::Rpc("configuration database locked by user foo".to_string());
        assert_eq!(err.to_string(), "configuration database locked by user foo");
    }
}
