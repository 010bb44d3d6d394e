use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{ColumnId, Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Add,
    Move,
    Delete,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::Add => "add",
            MutationKind::Move => "move",
            MutationKind::Delete => "delete",
        }
    }

    /// User-facing text shown when confirmation of this kind fails.
    pub fn failure_message(self) -> &'static str {
        match self {
            MutationKind::Add => "Failed to add task. Please try again.",
            MutationKind::Move => "Failed to move task. Please try again.",
            MutationKind::Delete => "Failed to delete task. Please try again.",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ConfirmationRequest {
    AddTask {
        column_id: ColumnId,
        task: Task,
    },
    MoveTask {
        task_id: TaskId,
        from_column: ColumnId,
        to_column: ColumnId,
    },
    DeleteTask {
        task_id: TaskId,
        column_id: ColumnId,
    },
}

impl ConfirmationRequest {
    pub fn kind(&self) -> MutationKind {
        match self {
            ConfirmationRequest::AddTask { .. } => MutationKind::Add,
            ConfirmationRequest::MoveTask { .. } => MutationKind::Move,
            ConfirmationRequest::DeleteTask { .. } => MutationKind::Delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveReceipt {
    pub task_id: TaskId,
    pub from_column: ColumnId,
    pub to_column: ColumnId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReceipt {
    pub task_id: TaskId,
    pub column_id: ColumnId,
}
