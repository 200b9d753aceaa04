//! Check-or-commit step.
//!
//! From the "candidate loaded" state there are two terminal actions:
//!
//! - [`CommitMode::Check`]: `commit_check` only. `changed` stays false.
//! - [`CommitMode::Commit`]: `commit` with the supplied [`CommitOptions`].
//!   With a confirm window the device reverts on its own unless a confirming
//!   commit follows; that follow-up is left to the operator.
//!
//! A failure in either mode is a [`TransactionError::Commit`], since both run
//! the same device-side validation.

use super::error::TransactionError;
use super::session::SessionGuard;
use super::{RollbackRequest, TransactionState};
use crate::device::CommitOptions;
use crate::logging::{Stage, TransactionLog};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    Check,
    Commit,
}

#[derive(Debug, Clone)]
pub struct CommitController {
    mode: CommitMode,
    options: CommitOptions,
}

impl CommitController {
    pub fn new(mode: CommitMode, options: CommitOptions) -> Self {
        Self { mode, options }
    }

    pub fn from_request(request: &RollbackRequest) -> Self {
        let mode = if request.check_mode {
            CommitMode::Check
        } else {
            CommitMode::Commit
        };
        Self::new(mode, request.commit_options())
    }

    pub fn mode(&self) -> CommitMode {
        self.mode
    }

    pub fn options(&self) -> &CommitOptions {
        &self.options
    }

    /// State reached when [`apply`](Self::apply) succeeds
    pub fn terminal_state(&self) -> TransactionState {
        match self.mode {
            CommitMode::Check => TransactionState::Checked,
            CommitMode::Commit => TransactionState::Committed,
        }
    }

    /// Run the step; `Ok(true)` only after a real commit
    pub async fn apply(
        &self,
        session: &mut SessionGuard,
        log: &TransactionLog,
    ) -> Result<bool, TransactionError> {
        match self.mode {
            CommitMode::Check => {
                if self.options != CommitOptions::default() {
                    log.debug(Stage::Check, "Check mode ignores comment and confirm")
                        .await;
                }
                log.info(Stage::Check, "Performing commit check").await;

                let device = session.session(Stage::Check)?;
                match device.commit_check().await {
                    Ok(()) => {
                        log.info(Stage::Check, "Commit check passed").await;
                        Ok(false)
                    }
                    Err(e) => {
                        let err = TransactionError::Commit(e);
                        log.error(Stage::Check, &err.to_string()).await;
                        Err(err)
                    }
                }
            }
            CommitMode::Commit => {
                log.info(Stage::Commit, &self.describe()).await;

                let device = session.session(Stage::Commit)?;
                match device.commit(&self.options).await {
                    Ok(()) => {
                        if let Some(minutes) = self.options.confirm {
                            log.info(
                                Stage::Commit,
                                &format!(
                                    "Committed; device reverts in {} minute(s) unless confirmed",
                                    minutes
                                ),
                            )
                            .await;
                        } else {
                            log.info(Stage::Commit, "Committed").await;
                        }
                        Ok(true)
                    }
                    Err(e) => {
                        let err = TransactionError::Commit(e);
                        log.error(Stage::Commit, &err.to_string()).await;
                        Err(err)
                    }
                }
            }
        }
    }

    fn describe(&self) -> String {
        let mut message = "Committing".to_string();
        if let Some(ref comment) = self.options.comment {
            message.push_str(&format!(" with comment {:?}", comment));
        }
        if let Some(minutes) = self.options.confirm {
            message.push_str(&format!(" (confirm within {} minutes)", minutes));
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_request() {
        let check = CommitController::from_request(&RollbackRequest::new(2).in_check_mode());
        assert_eq!(check.mode(), CommitMode::Check);
        assert_eq!(check.terminal_state(), TransactionState::Checked);

        let commit = CommitController::from_request(
            &RollbackRequest::new(1).with_comment("Rolled back by Ansible").with_confirm(5),
        );
        assert_eq!(commit.mode(), CommitMode::Commit);
        assert_eq!(commit.terminal_state(), TransactionState::Committed);
        assert_eq!(
            commit.options(),
            &CommitOptions::new().with_comment("Rolled back by Ansible").with_confirm(5)
        );
    }

    #[test]
    fn test_omitted_options_stay_absent() {
        let commit = CommitController::from_request(&RollbackRequest::new(3));
        assert_eq!(commit.options(), &CommitOptions::default());
        assert_eq!(commit.describe(), "Committing");
    }
}
