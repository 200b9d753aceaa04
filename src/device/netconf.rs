//! Junos NETCONF session over the `ssh` NETCONF subsystem.
//!
//! The transport is the system OpenSSH client spawned with `-s <host> netconf`,
//! so host keys, agents and `~/.ssh/config` behave exactly as they do for an
//! operator's interactive login. Without a password the client runs with
//! `BatchMode=yes` and relies on key-based trust; with a password it is fed
//! through a private `SSH_ASKPASS` helper that reads it from the child's
//! environment.

use super::rpc::{self, RpcReply};
use super::{CommitOptions, DeviceClient, DeviceError, DeviceSession};
use crate::env;
use crate::transaction::ConnectionParams;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempPath;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Transport settings for [`NetconfClient`]
#[derive(Debug, Clone)]
pub struct NetconfConfig {
    /// OpenSSH client binary, resolved on `PATH`
    pub ssh_program: String,
    /// Budget for TCP connect, authentication and hello exchange
    pub connect_timeout: Duration,
    /// Budget for a single RPC round trip
    pub rpc_timeout: Duration,
    /// Refuse unknown host keys instead of accepting new ones
    pub strict_host_key_checking: bool,
}

impl Default for NetconfConfig {
    fn default() -> Self {
        Self {
            ssh_program: env::netconf::DEFAULT_SSH_PROGRAM.to_string(),
            connect_timeout: Duration::from_secs(env::netconf::DEFAULT_CONNECT_TIMEOUT_SECS),
            rpc_timeout: Duration::from_secs(env::netconf::DEFAULT_RPC_TIMEOUT_SECS),
            strict_host_key_checking: false,
        }
    }
}

/// Hands out NETCONF sessions backed by the OpenSSH client
#[derive(Debug, Clone, Default)]
pub struct NetconfClient {
    config: NetconfConfig,
}

impl NetconfClient {
    pub fn new(config: NetconfConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NetconfConfig {
        &self.config
    }
}

impl DeviceClient for NetconfClient {
    fn session(&self, params: &ConnectionParams) -> Box<dyn DeviceSession> {
        Box::new(NetconfSession::new(params.clone(), self.config.clone()))
    }

    fn client_name(&self) -> &'static str {
        "netconf"
    }
}

/// OpenSSH arguments for a NETCONF subsystem session
fn ssh_args(config: &NetconfConfig, params: &ConnectionParams) -> Vec<String> {
    let mut args = vec![
        "-p".to_string(),
        params.port.to_string(),
        "-l".to_string(),
        params.user.clone(),
        "-o".to_string(),
        format!("ConnectTimeout={}", config.connect_timeout.as_secs().max(1)),
        "-o".to_string(),
        format!(
            "StrictHostKeyChecking={}",
            if config.strict_host_key_checking {
                "yes"
            } else {
                "accept-new"
            }
        ),
    ];

    if params.password.is_some() {
        args.extend([
            "-o".to_string(),
            "PreferredAuthentications=password,keyboard-interactive".to_string(),
            "-o".to_string(),
            "NumberOfPasswordPrompts=1".to_string(),
        ]);
    } else {
        args.extend(["-o".to_string(), "BatchMode=yes".to_string()]);
    }

    args.extend(["-s".to_string(), params.host.clone(), "netconf".to_string()]);
    args
}

/// Writes a helper that echoes the password from the child's environment.
#[cfg(unix)]
fn askpass_helper() -> Result<TempPath, std::io::Error> {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let mut file = tempfile::Builder::new()
        .prefix("junos-rollback-askpass-")
        .suffix(".sh")
        .tempfile()?;
    writeln!(file, "#!/bin/sh")?;
    writeln!(file, "printf '%s\\n' \"${}\"", env::netconf::PASSWORD_ENV_VAR)?;
    file.as_file()
        .set_permissions(std::fs::Permissions::from_mode(0o700))?;
    // Closing the handle first avoids ETXTBSY when ssh executes it.
    Ok(file.into_temp_path())
}

#[cfg(not(unix))]
fn askpass_helper() -> Result<TempPath, std::io::Error> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "password authentication requires a unix host; use key-based trust",
    ))
}

/// A running `ssh` child speaking EOM-framed NETCONF
struct Transport {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    pending: Vec<u8>,
    stderr_task: Option<JoinHandle<String>>,
    _askpass: Option<TempPath>,
}

impl Transport {
    async fn spawn(config: &NetconfConfig, params: &ConnectionParams) -> Result<Self, DeviceError> {
        let program = which::which(&config.ssh_program).map_err(|e| {
            DeviceError::Connect(format!("{} not found: {}", config.ssh_program, e))
        })?;

        let args = ssh_args(config, params);
        debug!(
            "Spawning NETCONF transport: {} {}",
            program.display(),
            args.iter()
                .map(|a| shell_escape::escape(a.as_str().into()).into_owned())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let askpass = match params.password {
            Some(ref password) => {
                let helper = askpass_helper().map_err(|e| {
                    DeviceError::Connect(format!("Failed to prepare askpass helper: {}", e))
                })?;
                command
                    .env("SSH_ASKPASS", &*helper)
                    .env("SSH_ASKPASS_REQUIRE", "force")
                    .env(
                        "DISPLAY",
                        std::env::var("DISPLAY").unwrap_or_else(|_| ":0".to_string()),
                    )
                    .env(env::netconf::PASSWORD_ENV_VAR, password);
                Some(helper)
            }
            None => None,
        };

        let mut child = command.spawn().map_err(|e| {
            DeviceError::Connect(format!("Failed to spawn {}: {}", program.display(), e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DeviceError::Connect("Failed to capture ssh stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DeviceError::Connect("Failed to capture ssh stdout".to_string()))?;
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buffer = String::new();
                let _ = stderr.read_to_string(&mut buffer).await;
                buffer
            })
        });

        Ok(Self {
            child,
            stdin,
            stdout,
            pending: Vec::new(),
            stderr_task,
            _askpass: askpass,
        })
    }

    async fn write_message(&mut self, message: &str) -> Result<(), DeviceError> {
        self.stdin.write_all(message.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Read up to the next end-of-message marker
    async fn read_message(&mut self) -> Result<String, DeviceError> {
        let delimiter = rpc::EOM_DELIMITER.as_bytes();
        loop {
            if let Some(pos) = find_subsequence(&self.pending, delimiter) {
                let message: Vec<u8> = self
                    .pending
                    .drain(..pos + delimiter.len())
                    .take(pos)
                    .collect();
                return decode_message(message);
            }

            let mut chunk = [0u8; 8192];
            let read = self.stdout.read(&mut chunk).await?;
            if read == 0 {
                return Err(DeviceError::Transport(
                    "device closed the NETCONF channel".to_string(),
                ));
            }
            self.pending.extend_from_slice(&chunk[..read]);
        }
    }

    /// Kill ssh and return whatever it printed on stderr
    async fn kill(mut self) -> String {
        let _ = self.child.kill().await;
        match self.stderr_task.take() {
            Some(task) => tokio::time::timeout(Duration::from_secs(2), task)
                .await
                .ok()
                .and_then(|joined| joined.ok())
                .unwrap_or_default(),
            None => String::new(),
        }
    }

    /// Let ssh exit on EOF, killing it if it lingers
    async fn shutdown(mut self, host: &str) {
        let _ = self.stdin.shutdown().await;
        if tokio::time::timeout(Duration::from_secs(5), self.child.wait())
            .await
            .is_err()
        {
            warn!("[{}] ssh did not exit after close-session, killing it", host);
            let _ = self.child.kill().await;
        }
    }
}

/// One NETCONF session against a Junos device
pub struct NetconfSession {
    params: ConnectionParams,
    config: NetconfConfig,
    transport: Option<Transport>,
    message_id: u64,
}

impl NetconfSession {
    pub fn new(params: ConnectionParams, config: NetconfConfig) -> Self {
        Self {
            params,
            config,
            transport: None,
            message_id: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    async fn exchange_hello(transport: &mut Transport) -> Result<Option<u64>, DeviceError> {
        let hello = transport.read_message().await?;
        if !hello.contains(rpc::BASE_CAPABILITY) {
            return Err(DeviceError::Connect(
                "device does not advertise NETCONF base:1.0".to_string(),
            ));
        }
        transport.write_message(&rpc::client_hello()).await?;
        Ok(rpc::hello_session_id(&hello))
    }

    async fn exchange(
        transport: &mut Transport,
        message_id: u64,
        operation: &str,
    ) -> Result<String, DeviceError> {
        transport
            .write_message(&rpc::envelope(message_id, operation))
            .await?;
        transport.read_message().await
    }

    /// Parse a reply and make sure it answers request `message_id`
    fn match_reply(message_id: u64, raw: &str) -> Result<RpcReply, DeviceError> {
        let reply = RpcReply::parse(raw)?;
        let expected = message_id.to_string();
        if reply.message_id.as_deref() != Some(expected.as_str()) {
            return Err(DeviceError::Transport(format!(
                "reply message-id {} does not match request {}",
                reply.message_id.as_deref().unwrap_or("(none)"),
                message_id
            )));
        }
        Ok(reply)
    }

    /// Tear down a channel whose framing can no longer be trusted.
    ///
    /// A late or foreign reply may still be in flight, so the next request
    /// must not read from this channel. Later calls see `SessionClosed`.
    async fn abandon(&mut self, error: &DeviceError) {
        if let Some(transport) = self.transport.take() {
            warn!(
                "[{}] dropping NETCONF channel after {}",
                self.params.host, error
            );
            let stderr = transport.kill().await;
            if !stderr.trim().is_empty() {
                debug!("[{}] ssh stderr: {}", self.params.host, stderr.trim());
            }
        }
    }

    async fn rpc(&mut self, operation: &str) -> Result<RpcReply, DeviceError> {
        let transport = self.transport.as_mut().ok_or(DeviceError::SessionClosed)?;

        self.message_id += 1;
        let message_id = self.message_id;
        debug!("[{}] rpc {} -> {}", self.params.host, message_id, operation);

        let timeout = self.config.rpc_timeout;
        let reply = match tokio::time::timeout(
            timeout,
            Self::exchange(transport, message_id, operation),
        )
        .await
        {
            Ok(Ok(raw)) => Self::match_reply(message_id, &raw),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DeviceError::Timeout(timeout)),
        };

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                self.abandon(&e).await;
                return Err(e);
            }
        };

        for warning in reply.warnings() {
            warn!("[{}] device warning: {}", self.params.host, warning.message);
        }
        reply.into_result()
    }
}

#[async_trait]
impl DeviceSession for NetconfSession {
    async fn open(&mut self) -> Result<(), DeviceError> {
        if self.transport.is_some() {
            return Err(DeviceError::InvalidArgument(
                "session is already open".to_string(),
            ));
        }

        let mut transport = Transport::spawn(&self.config, &self.params).await?;

        let timeout = self.config.connect_timeout;
        let hello = tokio::time::timeout(timeout, Self::exchange_hello(&mut transport)).await;
        let error = match hello {
            Ok(Ok(session_id)) => {
                self.transport = Some(transport);
                info!(
                    "NETCONF session {} established with {}:{}",
                    session_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "?".to_string()),
                    self.params.host,
                    self.params.port
                );
                return Ok(());
            }
            Ok(Err(e)) => e,
            Err(_) => DeviceError::Timeout(timeout),
        };

        let stderr = transport.kill().await;
        let detail = stderr.trim();
        if detail.is_empty() {
            Err(DeviceError::Connect(error.to_string()))
        } else {
            Err(DeviceError::Connect(format!("{} ({})", error, detail)))
        }
    }

    async fn lock(&mut self) -> Result<(), DeviceError> {
        self.rpc(&rpc::lock_configuration()).await.map(|_| ())
    }

    async fn unlock(&mut self) -> Result<(), DeviceError> {
        self.rpc(&rpc::unlock_configuration()).await.map(|_| ())
    }

    async fn rollback(&mut self, id: u8) -> Result<(), DeviceError> {
        if id > env::MAX_ROLLBACK_ID {
            return Err(DeviceError::InvalidArgument(format!(
                "Invalid rollback {}: must be between 0 and {}",
                id,
                env::MAX_ROLLBACK_ID
            )));
        }
        self.rpc(&rpc::load_rollback(id)).await.map(|_| ())
    }

    async fn diff(&mut self) -> Result<Option<String>, DeviceError> {
        let reply = self.rpc(&rpc::compare_candidate()).await?;
        Ok(reply.configuration_output())
    }

    async fn commit_check(&mut self) -> Result<(), DeviceError> {
        self.rpc(&rpc::commit_check()).await.map(|_| ())
    }

    async fn commit(&mut self, options: &CommitOptions) -> Result<(), DeviceError> {
        self.rpc(&rpc::commit(options)).await.map(|_| ())
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        let Some(mut transport) = self.transport.take() else {
            return Ok(());
        };

        self.message_id += 1;
        let timeout = self.config.rpc_timeout;
        let result = match tokio::time::timeout(
            timeout,
            Self::exchange(&mut transport, self.message_id, &rpc::close_session()),
        )
        .await
        {
            Ok(Ok(raw)) => Self::match_reply(self.message_id, &raw)
                .and_then(RpcReply::into_result)
                .map(|_| ()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DeviceError::Timeout(timeout)),
        };

        transport.shutdown(&self.params.host).await;
        result
    }
}

fn decode_message(message: Vec<u8>) -> Result<String, DeviceError> {
    String::from_utf8(message)
        .map_err(|e| DeviceError::Transport(format!("reply is not valid UTF-8: {}", e)))
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
