//! CLI-specific functionality for junos-rollback
//!
//! This module contains argument parsing, orchestrator argument files,
//! parameter validation and configuration discovery.

pub mod args;
pub mod config;
pub mod params;

pub use args::{Args, ArgsSource, ExecutionMode, RollbackConfig};
pub use config::{ConfigDiscovery, RollbackDefaults};
pub use params::{ModuleArgs, ParamError, ResolvedParams};
