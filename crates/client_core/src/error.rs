use shared::domain::{ColumnId, TaskId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("unknown column '{0}'")]
    UnknownColumn(ColumnId),
    #[error("task id '{0}' already exists on the board")]
    DuplicateTaskId(TaskId),
    #[error("cannot move a task from column '{0}' onto itself")]
    SameColumnMove(ColumnId),
}

/// Local precondition failures. These are raised before any state changes;
/// remote confirmation failures never surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("task content must not be blank")]
    EmptyContent,
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("username must not be blank")]
    BlankUsername,
    #[error("session storage failed: {0}")]
    Storage(#[from] anyhow::Error),
}
