//! Snapshot id validation and restore.

use super::error::TransactionError;
use super::session::SessionGuard;
use crate::env;
use crate::logging::{Stage, TransactionLog};
use serde::Serialize;
use std::fmt;

/// A rollback snapshot slot known to be within `0..=49`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RollbackId(u8);

impl RollbackId {
    pub const MAX: u8 = env::MAX_ROLLBACK_ID;

    /// Pure range check; no device is involved.
    pub fn new(id: i64) -> Result<Self, TransactionError> {
        match u8::try_from(id) {
            Ok(slot) if slot <= Self::MAX => Ok(Self(slot)),
            _ => Err(TransactionError::Validation(format!(
                "rollback id {} is out of range, must be between 0 and {}",
                id,
                Self::MAX
            ))),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for RollbackId {
    type Error = TransactionError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl fmt::Display for RollbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Loads a snapshot into the candidate configuration
pub struct RollbackExecutor;

impl RollbackExecutor {
    /// Restore snapshot `id`. Both client-side and device-side rejections
    /// surface as [`TransactionError::Rollback`]; the log line names which
    /// side refused.
    pub async fn restore(
        session: &mut SessionGuard,
        id: RollbackId,
        log: &TransactionLog,
    ) -> Result<(), TransactionError> {
        log.info(Stage::Rollback, &format!("Rolling back to {}", id))
            .await;

        let device = session.session(Stage::Rollback)?;
        match device.rollback(id.get()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let err = TransactionError::Rollback(e);
                let message = match err.origin() {
                    Some(origin) => format!("{} ({} rejection)", err, origin),
                    None => err.to_string(),
                };
                log.error(Stage::Rollback, &message).await;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::ErrorClass;

    #[test]
    fn test_rollback_id_bounds() {
        assert_eq!(RollbackId::new(0).unwrap().get(), 0);
        assert_eq!(RollbackId::new(49).unwrap().get(), 49);

        for id in [-1, 50, 255, 256, i64::MIN, i64::MAX] {
            let err = RollbackId::new(id).unwrap_err();
            assert_eq!(err.class(), ErrorClass::Validation, "id {} should be rejected", id);
            assert!(err.to_string().contains(&id.to_string()));
        }
    }

    #[test]
    fn test_rollback_id_try_from() {
        let id: RollbackId = 7i64.try_into().unwrap();
        assert_eq!(id.to_string(), "7");
        assert!(RollbackId::try_from(64i64).is_err());
    }
}
