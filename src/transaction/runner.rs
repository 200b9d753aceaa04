//! Transaction state machine.

use super::commit::CommitController;
use super::diff::DiffCapturer;
use super::error::TransactionError;
use super::lock::LockGuard;
use super::outcome::{OutcomeReporter, StageFailure, TransactionOutcome};
use super::rollback::{RollbackExecutor, RollbackId};
use super::session::SessionGuard;
use super::{ConnectionParams, RollbackRequest, TransactionState};
use crate::device::DeviceClient;
use crate::logging::{Stage, TransactionLog};

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct TransactionReport {
    pub outcome: TransactionOutcome,
    /// Every state entered, starting with `Unopened`
    pub states: Vec<TransactionState>,
    pub diff: Option<String>,
}

impl TransactionReport {
    pub fn final_state(&self) -> TransactionState {
        self.states
            .last()
            .copied()
            .unwrap_or(TransactionState::Unopened)
    }

    pub fn visited(&self, state: TransactionState) -> bool {
        self.states.contains(&state)
    }
}

/// One rollback against one device
#[derive(Debug, Clone)]
pub struct RollbackTransaction {
    params: ConnectionParams,
    request: RollbackRequest,
    log: TransactionLog,
}

struct Run {
    states: Vec<TransactionState>,
    diff: Option<String>,
}

impl Run {
    fn enter(&mut self, state: TransactionState) {
        tracing::debug!("transaction state -> {}", state);
        self.states.push(state);
    }
}

impl RollbackTransaction {
    pub fn new(params: ConnectionParams, request: RollbackRequest, log: TransactionLog) -> Self {
        Self {
            params,
            request,
            log,
        }
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn request(&self) -> &RollbackRequest {
        &self.request
    }

    /// Run to completion. Never panics on device failure and always closes
    /// the session it opened exactly once.
    pub async fn run(&self, client: &dyn DeviceClient) -> TransactionReport {
        let mut run = Run {
            states: vec![TransactionState::Unopened],
            diff: None,
        };

        let result = self.execute(client, &mut run).await;
        let outcome = OutcomeReporter::report(result);

        match &outcome {
            TransactionOutcome::Success { changed } => {
                self.log
                    .info(
                        Stage::Close,
                        &format!("Rollback transaction finished, changed={}", changed),
                    )
                    .await
            }
            TransactionOutcome::Failure { error, changed } => {
                self.log
                    .error(
                        Stage::Close,
                        &format!(
                            "Rollback transaction failed ({}), changed={}: {}",
                            error.class(),
                            changed,
                            error
                        ),
                    )
                    .await
            }
        }

        TransactionReport {
            outcome,
            states: run.states,
            diff: run.diff,
        }
    }

    async fn execute(&self, client: &dyn DeviceClient, run: &mut Run) -> Result<bool, StageFailure> {
        let id = self.validate().await?;

        let mut session = match SessionGuard::open(client, &self.params, &self.log).await {
            Ok(session) => session,
            Err(e) => {
                run.enter(TransactionState::Closed);
                return Err(e.into());
            }
        };
        run.enter(TransactionState::Open);

        let result = self.run_open(&mut session, id, run).await;

        if session.close(&self.log).await {
            run.enter(TransactionState::Closed);
        }
        result
    }

    async fn validate(&self) -> Result<RollbackId, TransactionError> {
        let checked = RollbackId::new(self.request.rollback_id).and_then(|id| {
            if self.request.confirm == Some(0) {
                Err(TransactionError::Validation(
                    "confirm must be a positive number of minutes".to_string(),
                ))
            } else {
                Ok(id)
            }
        });

        if let Err(ref e) = checked {
            self.log.error(Stage::Validate, &e.to_string()).await;
        }
        checked
    }

    async fn run_open(
        &self,
        session: &mut SessionGuard,
        id: RollbackId,
        run: &mut Run,
    ) -> Result<bool, StageFailure> {
        let mut lock = LockGuard::acquire(session, &self.log).await?;
        run.enter(TransactionState::Locked);

        match self.run_locked(session, id, run).await {
            Ok(changed) => match lock.release(session, &self.log).await {
                Ok(()) => {
                    run.enter(TransactionState::Unlocked);
                    Ok(changed)
                }
                Err(error) => Err(StageFailure { error, changed }),
            },
            Err(error) => {
                // Best effort; the original failure keeps its classification.
                match lock.release(session, &self.log).await {
                    Ok(()) => run.enter(TransactionState::Unlocked),
                    Err(unlock_error) => {
                        self.log
                            .warn(
                                Stage::Unlock,
                                &format!(
                                    "Lock may still be held after {}: {}",
                                    error.class(),
                                    unlock_error
                                ),
                            )
                            .await
                    }
                }
                Err(error.into())
            }
        }
    }

    async fn run_locked(
        &self,
        session: &mut SessionGuard,
        id: RollbackId,
        run: &mut Run,
    ) -> Result<bool, TransactionError> {
        RollbackExecutor::restore(session, id, &self.log).await?;
        run.enter(TransactionState::RolledBack);

        run.diff =
            DiffCapturer::capture(session, self.request.diffs_file.as_deref(), &self.log).await?;
        run.enter(TransactionState::Diffed);

        let controller = CommitController::from_request(&self.request);
        let changed = controller.apply(session, &self.log).await?;
        run.enter(controller.terminal_state());

        Ok(changed)
    }
}
