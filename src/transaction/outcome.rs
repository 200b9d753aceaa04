//! Reduction of a run to one result.

use super::error::{ErrorClass, TransactionError};
use serde::{Deserialize, Serialize};

/// A fatal error together with whether the change had already been applied.
///
/// `changed` is only ever true for an unlock failure after a real commit.
#[derive(Debug, Clone)]
pub struct StageFailure {
    pub error: TransactionError,
    pub changed: bool,
}

impl From<TransactionError> for StageFailure {
    fn from(error: TransactionError) -> Self {
        Self {
            error,
            changed: false,
        }
    }
}

/// Final result of one transaction
#[derive(Debug, Clone)]
pub enum TransactionOutcome {
    Success { changed: bool },
    Failure { error: TransactionError, changed: bool },
}

impl TransactionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransactionOutcome::Success { .. })
    }

    pub fn changed(&self) -> bool {
        match self {
            TransactionOutcome::Success { changed } => *changed,
            TransactionOutcome::Failure { changed, .. } => *changed,
        }
    }

    pub fn error(&self) -> Option<&TransactionError> {
        match self {
            TransactionOutcome::Success { .. } => None,
            TransactionOutcome::Failure { error, .. } => Some(error),
        }
    }

    pub fn class(&self) -> Option<ErrorClass> {
        self.error().map(TransactionError::class)
    }

    pub fn message(&self) -> Option<String> {
        self.error().map(ToString::to_string)
    }

    /// Process exit status for the orchestrator
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    pub fn to_payload(&self) -> ResultPayload {
        match self {
            TransactionOutcome::Success { changed } => ResultPayload::success(*changed),
            TransactionOutcome::Failure { error, changed } => ResultPayload {
                changed: *changed,
                failed: true,
                msg: Some(error.to_string()),
                error: Some(error.class()),
            },
        }
    }
}

/// JSON result handed back to the orchestrator.
///
/// Success is `{"changed": bool}`; failure adds `failed`, `msg` and `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPayload {
    pub changed: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorClass>,
}

impl ResultPayload {
    pub fn success(changed: bool) -> Self {
        Self {
            changed,
            failed: false,
            msg: None,
            error: None,
        }
    }

    /// Failure raised before any transaction exists, e.g. bad parameters
    pub fn failure(msg: impl Into<String>, error: Option<ErrorClass>) -> Self {
        Self {
            changed: false,
            failed: true,
            msg: Some(msg.into()),
            error,
        }
    }
}

pub struct OutcomeReporter;

impl OutcomeReporter {
    pub fn report(result: Result<bool, StageFailure>) -> TransactionOutcome {
        match result {
            Ok(changed) => TransactionOutcome::Success { changed },
            Err(StageFailure { error, changed }) => TransactionOutcome::Failure { error, changed },
        }
    }
}
