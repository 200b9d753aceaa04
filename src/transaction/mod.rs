//! # Rollback-Commit Transaction
//!
//! One invocation restores one archived configuration snapshot on one device
//! and either validates or commits it:
//!
//! ```text
//! Unopened → Open → Locked → RolledBack → Diffed → Checked | Committed → Unlocked → Closed
//! ```
//!
//! Every step returns a `Result`. A failure anywhere short-circuits to the
//! session guard's close, which runs exactly once on every path, and the run is
//! reduced to a single [`TransactionOutcome`].
//!
//! ## Components
//!
//! - **[`SessionGuard`]**: owns the device session and its single close
//! - **[`LockGuard`]**: configuration lock acquire/release
//! - **[`RollbackExecutor`]**: validated snapshot restore
//! - **[`DiffCapturer`]**: pending diff retrieval and best-effort persistence
//! - **[`CommitController`]**: check mode vs. commit mode
//! - **[`OutcomeReporter`]**: reduces the run to one result payload
//! - **[`RollbackTransaction`]**: drives the state machine
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use junos_rollback::device::NetconfClient;
//! use junos_rollback::logging::TransactionLog;
//! use junos_rollback::transaction::{ConnectionParams, RollbackRequest, RollbackTransaction};
//!
//! #[tokio::main]
//! async fn main() {
//!     let params = ConnectionParams::new("r1.example.net", "netops");
//!     let request = RollbackRequest::new(1)
//!         .with_comment("Rolled back by Ansible")
//!         .with_confirm(5);
//!     let log = TransactionLog::new("r1.example.net");
//!
//!     let transaction = RollbackTransaction::new(params, request, log);
//!     let report = transaction.run(&NetconfClient::default()).await;
//!     println!("{}", serde_json::to_string(&report.outcome.to_payload()).unwrap());
//! }
//! ```

use crate::device::CommitOptions;
use crate::env;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

pub mod commit;
pub mod diff;
pub mod error;
pub mod lock;
pub mod outcome;
pub mod rollback;
pub mod runner;
pub mod session;


pub use commit::{CommitController, CommitMode};
pub use diff::DiffCapturer;
pub use error::{DiffWriteError, ErrorClass, FailureOrigin, TransactionError};
pub use lock::LockGuard;
pub use outcome::{OutcomeReporter, ResultPayload, StageFailure, TransactionOutcome};
pub use rollback::{RollbackExecutor, RollbackId};
pub use runner::{RollbackTransaction, TransactionReport};
pub use session::SessionGuard;

/// Where and as whom to connect. Immutable for the run.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub user: String,
    /// `None` relies on key-based trust
    pub password: Option<String>,
    pub port: u16,
}

impl ConnectionParams {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: None,
            port: env::DEFAULT_NETCONF_PORT,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("port", &self.port)
            .finish()
    }
}

/// What to restore and how to apply it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackRequest {
    /// Raw snapshot index; validated before any connection attempt
    pub rollback_id: i64,
    pub check_mode: bool,
    pub comment: Option<String>,
    /// Confirmed-commit window in minutes
    pub confirm: Option<u32>,
    pub diffs_file: Option<PathBuf>,
}

impl RollbackRequest {
    pub fn new(rollback_id: i64) -> Self {
        Self {
            rollback_id,
            check_mode: false,
            comment: None,
            confirm: None,
            diffs_file: None,
        }
    }

    pub fn in_check_mode(mut self) -> Self {
        self.check_mode = true;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_confirm(mut self, minutes: u32) -> Self {
        self.confirm = Some(minutes);
        self
    }

    pub fn with_diffs_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.diffs_file = Some(path.into());
        self
    }

    /// Options forwarded to a real commit, carrying only what was supplied
    pub fn commit_options(&self) -> CommitOptions {
        CommitOptions {
            comment: self.comment.clone(),
            confirm: self.confirm,
        }
    }
}

/// States the transaction moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Unopened,
    Open,
    Locked,
    RolledBack,
    Diffed,
    Checked,
    Committed,
    Unlocked,
    Closed,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Unopened => "unopened",
            TransactionState::Open => "open",
            TransactionState::Locked => "locked",
            TransactionState::RolledBack => "rolled_back",
            TransactionState::Diffed => "diffed",
            TransactionState::Checked => "checked",
            TransactionState::Committed => "committed",
            TransactionState::Unlocked => "unlocked",
            TransactionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
