//! Configuration discovery and loading
//!
//! Defaults are looked up in this order, first hit wins:
//! 1. Current directory: ./junos-rollback.toml or ./.junos-rollback/config.toml
//! 2. User config: ~/.junos-rollback/config.toml
//! 3. System config: /etc/junos-rollback/config.toml
//! 4. Built-in defaults

use crate::device::NetconfConfig;
use crate::env;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Site-wide defaults for parameters the invocation leaves out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollbackDefaults {
    pub user: Option<String>,
    pub port: u16,
    pub logfile: Option<PathBuf>,
    pub ssh_program: String,
    pub connect_timeout_secs: u64,
    pub rpc_timeout_secs: u64,
    pub strict_host_key_checking: bool,
}

impl Default for RollbackDefaults {
    fn default() -> Self {
        Self {
            user: None,
            port: env::DEFAULT_NETCONF_PORT,
            logfile: None,
            ssh_program: env::netconf::DEFAULT_SSH_PROGRAM.to_string(),
            connect_timeout_secs: env::netconf::DEFAULT_CONNECT_TIMEOUT_SECS,
            rpc_timeout_secs: env::netconf::DEFAULT_RPC_TIMEOUT_SECS,
            strict_host_key_checking: false,
        }
    }
}

impl RollbackDefaults {
    pub fn netconf_config(&self) -> NetconfConfig {
        NetconfConfig {
            ssh_program: self.ssh_program.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            rpc_timeout: Duration::from_secs(self.rpc_timeout_secs),
            strict_host_key_checking: self.strict_host_key_checking,
        }
    }

    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: RollbackDefaults = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load `override_path` when given, otherwise walk the hierarchy
    pub fn load(override_path: Option<&Path>) -> Result<RollbackDefaults> {
        match override_path {
            Some(path) => {
                info!("Loading configuration override from: {:?}", path);
                RollbackDefaults::from_toml_file(path)
            }
            None => Self::discover_config(),
        }
    }

    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<RollbackDefaults> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return RollbackDefaults::from_toml_file(config_path);
        }

        debug!("No configuration file found, using defaults");
        Ok(RollbackDefaults::default())
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::get_config_candidates()
            .into_iter()
            .inspect(|candidate| debug!("Checking for config file: {:?}", candidate))
            .find(|candidate| candidate.is_file())
    }

    /// Configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std::env::current_dir() {
            candidates.push(current_dir.join(env::LOCAL_CONFIG_FILE_NAME));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        if let Some(home_dir) = env::home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(env::system_config_file_path());

        candidates
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        for (i, candidate) in Self::get_config_candidates().iter().enumerate() {
            let status = if candidate.is_file() {
                "✓ EXISTS"
            } else if candidate.exists() {
                "✗ NOT A FILE"
            } else {
                "✗ NOT FOUND"
            };
            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::find_config_file() {
            Some(found) => {
                println!("Active configuration: {:?}", found);
                match RollbackDefaults::from_toml_file(&found) {
                    Ok(config) => Self::print_effective(&config),
                    Err(e) => println!("  (unreadable: {:#})", e),
                }
            }
            None => {
                println!("Active configuration: Built-in defaults");
                Self::print_effective(&RollbackDefaults::default());
            }
        }
    }

    fn print_effective(config: &RollbackDefaults) {
        println!();
        match toml::to_string_pretty(config) {
            Ok(rendered) => print!("{}", rendered),
            Err(e) => println!("  (cannot render: {})", e),
        }
    }
}
