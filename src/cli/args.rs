//! Command line argument parsing
//!
//! Subcommands:
//! - `run`: Roll back one device from command line flags
//! - `args-file`: Roll back one device from an orchestrator JSON argument file
//! - `show-config`: Show configuration discovery information

use super::params::ModuleArgs;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Rollback(RollbackConfig),
    ShowConfig,
}

/// Where the rollback parameters come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgsSource {
    Flags(ModuleArgs),
    File(PathBuf),
}

#[derive(Debug)]
pub struct RollbackConfig {
    pub source: ArgsSource,
    pub config_override: Option<PathBuf>,
}

#[derive(Debug, Parser)]
#[command(name = "junos-rollback")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Restore a Junos device to an archived configuration under an exclusive lock"
)]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Roll back one device using command line flags
    Run {
        /// Device hostname or address
        #[arg(long = "host")]
        host: String,
        /// Rollback snapshot to restore (0-49)
        #[arg(short = 'r', long = "rollback", allow_negative_numbers = true)]
        rollback: i64,
        /// Login user (defaults to config file, then $USER)
        #[arg(short = 'u', long = "user")]
        user: Option<String>,
        /// Login password; key-based authentication when omitted
        #[arg(long = "passwd", env = "JUNOS_ROLLBACK_PASSWD", hide_env_values = true)]
        passwd: Option<String>,
        /// NETCONF port
        #[arg(short = 'p', long = "port", allow_negative_numbers = true)]
        port: Option<i64>,
        /// Append stage log lines to this file
        #[arg(long = "logfile", value_name = "FILE")]
        logfile: Option<PathBuf>,
        /// Commit log comment
        #[arg(long = "comment")]
        comment: Option<String>,
        /// Confirmed commit; reverts after this many minutes unless confirmed
        #[arg(long = "confirm", value_name = "MINUTES", allow_negative_numbers = true)]
        confirm: Option<i64>,
        /// Write the pending diff to this file
        #[arg(long = "diffs-file", value_name = "FILE")]
        diffs_file: Option<PathBuf>,
        /// Validate with commit check only; never commit
        #[arg(long = "check")]
        check: bool,
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
    /// Roll back one device using an orchestrator JSON argument file
    ArgsFile {
        /// Path to the JSON argument file
        file: PathBuf,
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
    /// Show configuration discovery information
    ShowConfig,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Run {
                host,
                rollback,
                user,
                passwd,
                port,
                logfile,
                comment,
                confirm,
                diffs_file,
                check,
                config,
            }) => Ok(ExecutionMode::Rollback(RollbackConfig {
                source: ArgsSource::Flags(ModuleArgs {
                    host: Some(host.clone()),
                    user: user.clone(),
                    passwd: passwd.clone(),
                    port: *port,
                    logfile: logfile.clone(),
                    rollback: Some(*rollback),
                    comment: comment.clone(),
                    confirm: *confirm,
                    diffs_file: diffs_file.clone(),
                    check_mode: *check,
                    ansible_check_mode: false,
                }),
                config_override: config.clone(),
            })),
            Some(Commands::ArgsFile { file, config }) => {
                Ok(ExecutionMode::Rollback(RollbackConfig {
                    source: ArgsSource::File(file.clone()),
                    config_override: config.clone(),
                }))
            }
            Some(Commands::ShowConfig) => Ok(ExecutionMode::ShowConfig),
            None => Err(
                "No command specified. Use 'junos-rollback --help' to see available commands."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command_flags() {
        let args = Args::try_parse_from([
            "junos-rollback",
            "run",
            "--host",
            "r1.example.net",
            "--rollback",
            "1",
            "--comment",
            "Rolled back by Ansible",
            "--confirm",
            "5",
            "--check",
        ])
        .unwrap();

        let ExecutionMode::Rollback(config) = args.mode().unwrap() else {
            panic!("Expected Rollback mode");
        };
        let ArgsSource::Flags(module_args) = config.source else {
            panic!("Expected flags source");
        };
        assert_eq!(module_args.host.as_deref(), Some("r1.example.net"));
        assert_eq!(module_args.rollback, Some(1));
        assert_eq!(module_args.comment.as_deref(), Some("Rolled back by Ansible"));
        assert_eq!(module_args.confirm, Some(5));
        assert!(module_args.check_mode);
        assert!(config.config_override.is_none());
    }

    #[test]
    fn test_negative_rollback_reaches_validation() {
        let args = Args::try_parse_from([
            "junos-rollback",
            "run",
            "--host",
            "r1",
            "--rollback",
            "-1",
        ])
        .unwrap();

        let ExecutionMode::Rollback(config) = args.mode().unwrap() else {
            panic!("Expected Rollback mode");
        };
        assert!(matches!(
            config.source,
            ArgsSource::Flags(ModuleArgs { rollback: Some(-1), .. })
        ));
    }

    #[test]
    fn test_run_requires_host_and_rollback() {
        assert!(Args::try_parse_from(["junos-rollback", "run", "--rollback", "1"]).is_err());
        assert!(Args::try_parse_from(["junos-rollback", "run", "--host", "r1"]).is_err());
    }

    #[test]
    fn test_args_file_command() {
        let args = Args {
            command: Some(Commands::ArgsFile {
                file: PathBuf::from("/tmp/ansible_args"),
                config: Some(PathBuf::from("site.toml")),
            }),
        };

        let ExecutionMode::Rollback(config) = args.mode().unwrap() else {
            panic!("Expected Rollback mode");
        };
        assert_eq!(
            config.source,
            ArgsSource::File(PathBuf::from("/tmp/ansible_args"))
        );
        assert_eq!(config.config_override, Some(PathBuf::from("site.toml")));
    }

    #[test]
    fn test_show_config_command() {
        let args = Args {
            command: Some(Commands::ShowConfig),
        };
        assert!(matches!(args.mode().unwrap(), ExecutionMode::ShowConfig));
    }

    #[test]
    fn test_no_command_error() {
        let args = Args { command: None };
        assert!(args.mode().is_err());
    }
}
