//! # junos-rollback
//!
//! Restores a Junos device to one of its archived configurations as a single
//! auditable transaction: connect, lock the configuration, load the rollback
//! snapshot, capture the pending diff, then either `commit check` or commit,
//! unlock and disconnect.
//!
//! ## Architecture Overview
//!
//! - **[`transaction`]**: The rollback state machine, its guards and the
//!   error classification every failure point maps to
//! - **[`device`]**: Device client seam and the NETCONF-over-SSH client
//! - **[`logging`]**: Per-transaction stage log sink
//! - **[`cli`]**: Argument parsing, argument files and configuration discovery
//! - **[`env`]**: Limits, defaults and configuration file locations
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use junos_rollback::{
//!     ConnectionParams, NetconfClient, RollbackRequest, RollbackTransaction, TransactionLog,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let params = ConnectionParams::new("r1.example.net", "netops");
//!     let request = RollbackRequest::new(1)
//!         .with_comment("Rolled back by Ansible")
//!         .with_confirm(5);
//!     let log = TransactionLog::new("r1.example.net");
//!
//!     let report = RollbackTransaction::new(params, request, log)
//!         .run(&NetconfClient::default())
//!         .await;
//!
//!     println!("{}", serde_json::to_string(&report.outcome.to_payload()).unwrap());
//! }
//! ```

/// Rollback-commit transaction.
///
/// Owns the ordering of device operations, the locking discipline around
/// them and the guarantee that the session is closed exactly once.
pub mod transaction;

/// Device client abstraction and the NETCONF client.
pub mod device;

/// Per-transaction stage logging.
pub mod logging;

/// Environment constants and path utilities.
///
/// Centralizes limits, defaults and configuration file locations used
/// throughout the application.
pub mod env;

// CLI module for command-line interface
pub mod cli;

// Re-export main transaction types
pub use transaction::{
    ConnectionParams, ErrorClass, ResultPayload, RollbackRequest, RollbackTransaction,
    TransactionError, TransactionOutcome, TransactionReport, TransactionState,
};

// Re-export device types
pub use device::{
    CommitOptions, DeviceClient, DeviceError, DeviceSession, NetconfClient, NetconfConfig,
};

pub use logging::{Stage, TransactionLog};
