//! Environment constants and path utilities for junos-rollback.
//!
//! This module centralizes the fixed limits, default values and configuration
//! file locations used throughout the application.

use std::path::{Path, PathBuf};

/// Application directory name (hidden directory like .git, .ssh)
pub const APP_DIR_NAME: &str = ".junos-rollback";

/// Configuration file name inside [`APP_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Standalone configuration file name in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "junos-rollback.toml";

/// Highest rollback snapshot slot on the device (slots are zero-indexed)
pub const MAX_ROLLBACK_ID: u8 = 49;

/// IANA port for NETCONF over SSH
pub const DEFAULT_NETCONF_PORT: u16 = 830;

/// NETCONF transport defaults
pub mod netconf {
    /// OpenSSH client binary
    pub const DEFAULT_SSH_PROGRAM: &str = "ssh";

    /// Connect, authenticate and exchange hellos within this many seconds
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

    /// Single RPC round-trip budget in seconds
    pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 60;

    /// Child-only variable the askpass helper reads the password from
    pub const PASSWORD_ENV_VAR: &str = "JUNOS_ROLLBACK_PASSWORD";
}

/// Ambient login name, as `ssh` itself would pick it
pub fn current_user() -> Option<String> {
    ["USER", "LOGNAME", "USERNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
}

/// Home directory from the environment
pub fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .or_else(|| std::env::var("USERPROFILE").ok())
        .map(PathBuf::from)
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(APP_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// System-wide configuration file
pub fn system_config_file_path() -> PathBuf {
    PathBuf::from("/etc/junos-rollback").join(CONFIG_FILE_NAME)
}
