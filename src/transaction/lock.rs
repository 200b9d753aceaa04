//! Configuration lock discipline.
//!
//! The lock is fail-fast: a concurrent holder yields an immediate
//! [`TransactionError::Lock`], with no polling and no retry.

use super::error::TransactionError;
use super::session::SessionGuard;
use crate::logging::{Stage, TransactionLog};

/// Tracks whether this transaction holds the device's configuration lock
#[derive(Debug)]
pub struct LockGuard {
    held: bool,
}

impl LockGuard {
    pub async fn acquire(
        session: &mut SessionGuard,
        log: &TransactionLog,
    ) -> Result<Self, TransactionError> {
        log.info(Stage::Lock, "Taking configuration lock").await;

        let device = session.session(Stage::Lock)?;
        match device.lock().await {
            Ok(()) => {
                log.info(Stage::Lock, "Configuration locked").await;
                Ok(Self { held: true })
            }
            Err(e) => {
                let err = TransactionError::Lock(e);
                log.error(Stage::Lock, &err.to_string()).await;
                Err(err)
            }
        }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Release the lock. A second release is a no-op.
    ///
    /// The lock is considered given up after one attempt whatever the result;
    /// a failed unlock is never retried.
    pub async fn release(
        &mut self,
        session: &mut SessionGuard,
        log: &TransactionLog,
    ) -> Result<(), TransactionError> {
        if !self.held {
            return Ok(());
        }
        self.held = false;

        log.info(Stage::Unlock, "Unlocking configuration").await;
        let device = session.session(Stage::Unlock)?;
        match device.unlock().await {
            Ok(()) => {
                log.info(Stage::Unlock, "Configuration unlocked").await;
                Ok(())
            }
            Err(e) => {
                let err = TransactionError::Unlock(e);
                log.error(Stage::Unlock, &err.to_string()).await;
                Err(err)
            }
        }
    }
}
