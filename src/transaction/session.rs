//! Device session lifecycle.

use super::error::TransactionError;
use super::ConnectionParams;
use crate::device::{DeviceClient, DeviceSession};
use crate::logging::{Stage, TransactionLog};

/// Owns one device session and guarantees it is closed exactly once.
///
/// Async close cannot run from `Drop`, so callers must finish with
/// [`SessionGuard::close`]. Dropping a guard that still holds an open session
/// is logged as a bug.
pub struct SessionGuard {
    host: String,
    session: Option<Box<dyn DeviceSession>>,
}

impl SessionGuard {
    /// Open a session. On failure the half-built session is still closed once.
    pub async fn open(
        client: &dyn DeviceClient,
        params: &ConnectionParams,
        log: &TransactionLog,
    ) -> Result<Self, TransactionError> {
        log.info(
            Stage::Connect,
            &format!(
                "Connecting to {}:{} as {} via {}",
                params.host,
                params.port,
                params.user,
                client.client_name()
            ),
        )
        .await;

        let mut session = client.session(params);
        match session.open().await {
            Ok(()) => {
                log.info(Stage::Connect, "Connected").await;
                Ok(Self {
                    host: params.host.clone(),
                    session: Some(session),
                })
            }
            Err(e) => {
                let err = TransactionError::Connection {
                    host: params.host.clone(),
                    source: e,
                };
                log.error(Stage::Connect, &err.to_string()).await;
                if let Err(close_err) = session.close().await {
                    log.debug(
                        Stage::Close,
                        &format!("Cleanup after failed connect: {}", close_err),
                    )
                    .await;
                }
                Err(err)
            }
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// The live session, or `Unexpected` if it was already closed
    pub fn session(&mut self, stage: Stage) -> Result<&mut dyn DeviceSession, TransactionError> {
        match self.session {
            Some(ref mut session) => Ok(session.as_mut()),
            None => Err(TransactionError::Unexpected(format!(
                "device session closed before {}",
                stage
            ))),
        }
    }

    /// Close the session. Returns `false` when it was already closed.
    ///
    /// A failing close is logged; the transaction outcome is already decided.
    pub async fn close(&mut self, log: &TransactionLog) -> bool {
        let Some(mut session) = self.session.take() else {
            return false;
        };

        log.info(Stage::Close, "Closing session").await;
        if let Err(e) = session.close().await {
            log.warn(Stage::Close, &format!("Error while closing session: {}", e))
                .await;
        }
        true
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.session.is_some() {
            tracing::warn!("Session with {} dropped without being closed", self.host);
        }
    }
}
