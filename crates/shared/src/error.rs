use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::MutationKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unavailable,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

/// The only failure a remote confirmation can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} confirmation failed ({code:?}): {message}")]
pub struct OperationFailed {
    pub kind: MutationKind,
    pub code: ErrorCode,
    pub message: String,
}

impl OperationFailed {
    pub fn new(kind: MutationKind, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    /// The generic failure the simulated remote raises.
    pub fn unavailable(kind: MutationKind) -> Self {
        Self::new(
            kind,
            ErrorCode::Unavailable,
            format!("Failed to {} task", kind.as_str()),
        )
    }

    /// The remote refused the mutation itself rather than failing to answer.
    pub fn rejected(kind: MutationKind) -> Self {
        Self::new(
            kind,
            ErrorCode::Rejected,
            format!("Remote rejected the {} task", kind.as_str()),
        )
    }
}

impl From<OperationFailed> for ApiError {
    fn from(value: OperationFailed) -> Self {
        Self {
            code: value.code,
            message: value.message,
        }
    }
}
