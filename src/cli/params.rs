//! Invocation parameters and their validation.
//!
//! [`ModuleArgs`] is what the caller supplied, either from command line flags
//! or from an orchestrator's JSON argument file. [`ModuleArgs::resolve`] fills
//! the gaps from [`RollbackDefaults`] and rejects anything malformed before a
//! transaction is built.

use super::config::RollbackDefaults;
use crate::env;
use crate::transaction::{ConnectionParams, ErrorClass, RollbackRequest};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("Unable to read argument file {path}: {source}")]
    ReadArgs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to parse argument file {path}: {source}")]
    ParseArgs {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing required argument: {0}")]
    Missing(&'static str),

    #[error("host must not be empty")]
    EmptyHost,

    #[error("port must be between 1 and 65535, got {0}")]
    InvalidPort(i64),

    #[error("confirm must be a positive number of minutes, got {0}")]
    InvalidConfirm(i64),

    #[error("Unable to determine the remote user; set user or $USER")]
    UnknownUser,
}

impl ParamError {
    /// Argument files that cannot be read are environment trouble, the rest
    /// is a malformed request.
    pub fn class(&self) -> ErrorClass {
        match self {
            ParamError::ReadArgs { .. } => ErrorClass::Unexpected,
            _ => ErrorClass::Validation,
        }
    }
}

/// Parameters as supplied, before defaults and validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ModuleArgs {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub passwd: Option<String>,
    #[serde(default, deserialize_with = "loose_int")]
    pub port: Option<i64>,
    #[serde(default)]
    pub logfile: Option<PathBuf>,
    #[serde(default, deserialize_with = "loose_int")]
    pub rollback: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "loose_int")]
    pub confirm: Option<i64>,
    #[serde(default)]
    pub diffs_file: Option<PathBuf>,
    #[serde(default)]
    pub check_mode: bool,
    /// Check mode as injected by the orchestrator; either key enables it
    #[serde(default, rename = "_ansible_check_mode")]
    pub ansible_check_mode: bool,
}

/// Everything needed to build and log one transaction
#[derive(Debug, Clone)]
pub struct ResolvedParams {
    pub connection: ConnectionParams,
    pub request: RollbackRequest,
    pub logfile: Option<PathBuf>,
}

impl ModuleArgs {
    /// Read an orchestrator argument file. Unknown keys are ignored.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ParamError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ParamError::ReadArgs {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ParamError::ParseArgs {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Host for tagging log records, even when the rest is invalid
    pub fn host_label(&self) -> &str {
        self.host.as_deref().map(str::trim).unwrap_or("")
    }

    /// Apply `defaults` to whatever was left out and validate the result.
    ///
    /// The rollback id is passed through unchecked; its range belongs to the
    /// transaction, which rejects it before connecting.
    pub fn resolve(&self, defaults: &RollbackDefaults) -> Result<ResolvedParams, ParamError> {
        let host = self.host.as_deref().ok_or(ParamError::Missing("host"))?.trim();
        if host.is_empty() {
            return Err(ParamError::EmptyHost);
        }

        let rollback_id = self.rollback.ok_or(ParamError::Missing("rollback"))?;

        let port = match self.port {
            Some(port) => u16::try_from(port)
                .ok()
                .filter(|port| *port != 0)
                .ok_or(ParamError::InvalidPort(port))?,
            None if defaults.port == 0 => return Err(ParamError::InvalidPort(0)),
            None => defaults.port,
        };

        let user = self
            .user
            .clone()
            .filter(|user| !user.trim().is_empty())
            .or_else(|| defaults.user.clone())
            .or_else(env::current_user)
            .ok_or(ParamError::UnknownUser)?;

        let mut connection = ConnectionParams::new(host, user).with_port(port);
        if let Some(ref passwd) = self.passwd {
            connection = connection.with_password(passwd.clone());
        }

        let mut request = RollbackRequest::new(rollback_id);
        if self.check_mode || self.ansible_check_mode {
            request = request.in_check_mode();
        }
        if let Some(ref comment) = self.comment {
            request = request.with_comment(comment.clone());
        }
        if let Some(confirm) = self.confirm {
            let minutes = u32::try_from(confirm)
                .ok()
                .filter(|minutes| *minutes > 0)
                .ok_or(ParamError::InvalidConfirm(confirm))?;
            request = request.with_confirm(minutes);
        }
        if let Some(ref path) = self.diffs_file {
            request = request.with_diffs_file(path.clone());
        }

        Ok(ResolvedParams {
            connection,
            request,
            logfile: self.logfile.clone().or_else(|| defaults.logfile.clone()),
        })
    }
}

/// Integers may arrive as JSON numbers or as templated strings
fn loose_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Int(i64),
        Text(String),
    }

    match Option::<Loose>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Loose::Int(value)) => Ok(Some(value)),
        Some(Loose::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Loose::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected an integer, got {:?}", text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn args(host: &str, rollback: i64) -> ModuleArgs {
        ModuleArgs {
            host: Some(host.to_string()),
            user: Some("netops".to_string()),
            rollback: Some(rollback),
            ..ModuleArgs::default()
        }
    }

    #[test]
    fn test_orchestrator_json_with_check_mode_alias() {
        let parsed: ModuleArgs = serde_json::from_str(
            r#"{
                "host": "r1.example.net",
                "rollback": "2",
                "port": 830,
                "_ansible_check_mode": true,
                "_ansible_verbosity": 0
            }"#,
        )
        .unwrap();

        assert_eq!(parsed.host.as_deref(), Some("r1.example.net"));
        assert_eq!(parsed.rollback, Some(2));
        assert_eq!(parsed.port, Some(830));
        assert!(parsed.ansible_check_mode);
        assert!(!parsed.check_mode);

        let resolved = parsed.resolve(&RollbackDefaults::default()).unwrap();
        assert!(resolved.request.check_mode);
    }

    #[test]
    fn test_both_check_mode_keys_are_accepted() {
        for (own, injected, expected) in [
            (false, false, false),
            (true, false, true),
            (false, true, true),
            (true, true, true),
        ] {
            let json = format!(
                r#"{{"host": "r1", "user": "netops", "rollback": 1,
                    "check_mode": {}, "_ansible_check_mode": {}}}"#,
                own, injected
            );
            let parsed: ModuleArgs = serde_json::from_str(&json).unwrap();
            let resolved = parsed.resolve(&RollbackDefaults::default()).unwrap();
            assert_eq!(
                resolved.request.check_mode, expected,
                "check_mode={} _ansible_check_mode={}",
                own, injected
            );
        }
    }

    #[test]
    fn test_non_numeric_string_is_rejected() {
        let result: Result<ModuleArgs, _> =
            serde_json::from_str(r#"{"host": "r1", "rollback": "latest"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_applies_defaults() {
        let defaults = RollbackDefaults {
            port: 2830,
            logfile: Some(PathBuf::from("/tmp/rollback.log")),
            ..RollbackDefaults::default()
        };

        let resolved = args("r1", 1).resolve(&defaults).unwrap();
        assert_eq!(resolved.connection.host, "r1");
        assert_eq!(resolved.connection.port, 2830);
        assert_eq!(resolved.connection.password, None);
        assert_eq!(resolved.request.rollback_id, 1);
        assert!(!resolved.request.check_mode);
        assert_eq!(resolved.logfile, Some(PathBuf::from("/tmp/rollback.log")));
    }

    #[test]
    fn test_explicit_values_win() {
        let defaults = RollbackDefaults {
            user: Some("fallback".to_string()),
            port: 2830,
            ..RollbackDefaults::default()
        };
        let supplied = ModuleArgs {
            port: Some(22),
            passwd: Some("secret".to_string()),
            comment: Some("Rolled back by Ansible".to_string()),
            confirm: Some(5),
            diffs_file: Some(PathBuf::from("/tmp/diff.txt")),
            ..args("r1", 1)
        };

        let resolved = supplied.resolve(&defaults).unwrap();
        assert_eq!(resolved.connection.user, "netops");
        assert_eq!(resolved.connection.port, 22);
        assert_eq!(resolved.connection.password.as_deref(), Some("secret"));
        assert_eq!(
            resolved.request.comment.as_deref(),
            Some("Rolled back by Ansible")
        );
        assert_eq!(resolved.request.confirm, Some(5));
        assert_eq!(
            resolved.request.diffs_file,
            Some(PathBuf::from("/tmp/diff.txt"))
        );
    }

    #[test]
    fn test_out_of_range_rollback_is_left_to_the_transaction() {
        let resolved = args("r1", 50).resolve(&RollbackDefaults::default()).unwrap();
        assert_eq!(resolved.request.rollback_id, 50);
    }

    #[test]
    fn test_invalid_parameters() {
        let defaults = RollbackDefaults::default();

        let missing_host = ModuleArgs {
            host: None,
            ..args("", 1)
        };
        assert!(matches!(
            missing_host.resolve(&defaults),
            Err(ParamError::Missing("host"))
        ));
        assert!(matches!(
            args("   ", 1).resolve(&defaults),
            Err(ParamError::EmptyHost)
        ));

        let missing_rollback = ModuleArgs {
            rollback: None,
            ..args("r1", 0)
        };
        assert!(matches!(
            missing_rollback.resolve(&defaults),
            Err(ParamError::Missing("rollback"))
        ));

        for port in [0, -1, 70000] {
            let bad_port = ModuleArgs {
                port: Some(port),
                ..args("r1", 1)
            };
            assert!(matches!(
                bad_port.resolve(&defaults),
                Err(ParamError::InvalidPort(p)) if p == port
            ));
        }

        for confirm in [0, -5] {
            let bad_confirm = ModuleArgs {
                confirm: Some(confirm),
                ..args("r1", 1)
            };
            let err = bad_confirm.resolve(&defaults).unwrap_err();
            assert_eq!(err.class(), ErrorClass::Validation);
        }
    }

    #[test]
    #[serial]
    fn test_unknown_user() {
        let saved: Vec<_> = ["USER", "LOGNAME", "USERNAME"]
            .iter()
            .map(|key| (*key, std::env::var(key).ok()))
            .collect();
        unsafe {
            for (key, _) in &saved {
                std::env::remove_var(key);
            }
        }

        let supplied = ModuleArgs {
            user: None,
            ..args("r1", 1)
        };
        let result = supplied.resolve(&RollbackDefaults::default());

        unsafe {
            for (key, value) in &saved {
                if let Some(value) = value {
                    std::env::set_var(key, value);
                }
            }
        }

        assert!(matches!(result, Err(ParamError::UnknownUser)));
    }

    #[test]
    fn test_missing_args_file() {
        let err = ModuleArgs::from_json_file("/nonexistent/args.json").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Unexpected);
        assert!(err.to_string().contains("/nonexistent/args.json"));
    }
}
