//! Optimistic mutation protocol: snapshot, apply, confirm, then keep or undo.

use std::{str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use shared::{
    domain::{Board, ColumnId, Task, TaskId},
    error::{ApiError, OperationFailed},
    protocol::{ConfirmationRequest, MutationKind},
};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::{
    error::{MutationError, TransitionError},
    notifications::{NotificationId, NotificationQueue, Severity},
    store::BoardStore,
    task_ids::TaskIdGenerator,
    transition::{BoardAction, Compensation},
    RemoteConfirmation,
};

/// How a failed confirmation is undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStrategy {
    /// Restore the whole board captured before the optimistic change. Any
    /// mutation applied in between is discarded with it.
    #[default]
    Snapshot,
    /// Revert only the failed mutation's own task, so concurrent mutations
    /// survive.
    Compensate,
}

impl FromStr for RollbackStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "snapshot" => Ok(RollbackStrategy::Snapshot),
            "compensate" => Ok(RollbackStrategy::Compensate),
            other => Err(format!("unknown rollback strategy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Nothing to do; state was not touched.
    Skipped,
    Committed,
    RolledBack {
        error: OperationFailed,
        notification: NotificationId,
    },
}

impl MutationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, MutationOutcome::Committed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    Applied {
        request: ConfirmationRequest,
    },
    Confirmed {
        request: ConfirmationRequest,
    },
    RolledBack {
        request: ConfirmationRequest,
        error: ApiError,
        notification: NotificationId,
    },
}

/// One in-flight mutation. Consumed exactly once, by `commit` or `rollback`.
struct PendingMutation {
    previous_board: Board,
    request: ConfirmationRequest,
    compensation: Vec<Compensation>,
}

impl PendingMutation {
    fn kind(&self) -> MutationKind {
        self.request.kind()
    }

    fn commit(self) {
        info!(kind = self.kind().as_str(), "mutation confirmed");
    }

    fn rollback(
        self,
        store: &BoardStore,
        strategy: RollbackStrategy,
    ) -> Result<(), TransitionError> {
        let action = match strategy {
            RollbackStrategy::Snapshot => BoardAction::Rollback(self.previous_board),
            RollbackStrategy::Compensate => BoardAction::Compensate(self.compensation),
        };
        store.dispatch(action).map(|_| ())
    }
}

pub struct MutationCoordinator {
    store: Arc<BoardStore>,
    remote: Arc<dyn RemoteConfirmation>,
    notifications: NotificationQueue,
    ids: TaskIdGenerator,
    strategy: RollbackStrategy,
    events: broadcast::Sender<BoardEvent>,
}

impl MutationCoordinator {
    pub fn new(
        store: Arc<BoardStore>,
        remote: Arc<dyn RemoteConfirmation>,
        notifications: NotificationQueue,
    ) -> Self {
        let ids = TaskIdGenerator::new();
        ids.observe(&store.current());
        let (events, _) = broadcast::channel(256);
        Self {
            store,
            remote,
            notifications,
            ids,
            strategy: RollbackStrategy::default(),
            events,
        }
    }

    pub fn with_strategy(mut self, strategy: RollbackStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_id_generator(mut self, ids: TaskIdGenerator) -> Self {
        ids.observe(&self.store.current());
        self.ids = ids;
        self
    }

    pub fn strategy(&self) -> RollbackStrategy {
        self.strategy
    }

    pub fn store(&self) -> &Arc<BoardStore> {
        &self.store
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    /// Appends a new task to `column_id`. The returned task carries the id
    /// assigned here.
    pub async fn add_task(
        &self,
        column_id: &ColumnId,
        content: &str,
    ) -> Result<(Task, MutationOutcome), MutationError> {
        if content.trim().is_empty() {
            return Err(MutationError::EmptyContent);
        }
        self.require_column(column_id)?;

        let task = Task::new(self.ids.next_id(), content);
        let transition = self.store.dispatch(BoardAction::AddTaskOptimistic {
            column_id: column_id.clone(),
            task: task.clone(),
        })?;
        let pending = PendingMutation {
            previous_board: transition.previous,
            request: ConfirmationRequest::AddTask {
                column_id: column_id.clone(),
                task: task.clone(),
            },
            compensation: vec![Compensation::Remove {
                task_id: task.id.clone(),
            }],
        };

        let outcome = self.settle(pending).await;
        Ok((task, outcome))
    }

    /// Moves `item` to the end of `target_column`. Moving within one column
    /// is a no-op.
    pub async fn move_task(
        &self,
        source_column: &ColumnId,
        target_column: &ColumnId,
        item: Task,
    ) -> Result<MutationOutcome, MutationError> {
        if source_column == target_column {
            return Ok(MutationOutcome::Skipped);
        }
        self.require_column(source_column)?;
        self.require_column(target_column)?;

        let task_id = item.id.clone();
        let transition = self.store.dispatch(BoardAction::MoveTaskOptimistic {
            source_column: source_column.clone(),
            target_column: target_column.clone(),
            item,
        })?;

        let compensation = match task_at(&transition.previous, source_column, &task_id) {
            Some((task, index)) => Compensation::MoveBack {
                task,
                from_column: target_column.clone(),
                to_column: source_column.clone(),
                index,
            },
            None => Compensation::Remove {
                task_id: task_id.clone(),
            },
        };
        let pending = PendingMutation {
            previous_board: transition.previous,
            request: ConfirmationRequest::MoveTask {
                task_id,
                from_column: source_column.clone(),
                to_column: target_column.clone(),
            },
            compensation: vec![compensation],
        };

        Ok(self.settle(pending).await)
    }

    pub async fn delete_task(
        &self,
        column_id: &ColumnId,
        task_id: &TaskId,
    ) -> Result<MutationOutcome, MutationError> {
        self.require_column(column_id)?;

        let transition = self.store.dispatch(BoardAction::DeleteTaskOptimistic {
            column_id: column_id.clone(),
            task_id: task_id.clone(),
        })?;
        let compensation = task_at(&transition.previous, column_id, task_id)
            .map(|(task, index)| Compensation::Restore {
                column_id: column_id.clone(),
                task,
                index,
            })
            .into_iter()
            .collect();
        let pending = PendingMutation {
            previous_board: transition.previous,
            request: ConfirmationRequest::DeleteTask {
                task_id: task_id.clone(),
                column_id: column_id.clone(),
            },
            compensation,
        };

        Ok(self.settle(pending).await)
    }

    fn require_column(&self, column_id: &ColumnId) -> Result<(), MutationError> {
        if self.store.current().contains_column(column_id) {
            Ok(())
        } else {
            Err(TransitionError::UnknownColumn(column_id.clone()).into())
        }
    }

    /// Awaits confirmation for an already applied mutation and finishes it.
    async fn settle(&self, pending: PendingMutation) -> MutationOutcome {
        let _ = self.events.send(BoardEvent::Applied {
            request: pending.request.clone(),
        });

        match self.confirm(&pending.request).await {
            Ok(()) => {
                let request = pending.request.clone();
                pending.commit();
                let _ = self.events.send(BoardEvent::Confirmed { request });
                MutationOutcome::Committed
            }
            Err(failure) => {
                let kind = pending.kind();
                let request = pending.request.clone();
                warn!(kind = kind.as_str(), error = %failure, strategy = ?self.strategy, "confirmation failed; rolling back");
                if let Err(err) = pending.rollback(&self.store, self.strategy) {
                    error!(kind = kind.as_str(), error = %err, "rollback could not be applied");
                }

                let notification = self
                    .notifications
                    .enqueue(kind.failure_message(), Severity::Error);
                let _ = self.events.send(BoardEvent::RolledBack {
                    request,
                    error: failure.clone().into(),
                    notification,
                });
                MutationOutcome::RolledBack {
                    error: failure,
                    notification,
                }
            }
        }
    }

    async fn confirm(&self, request: &ConfirmationRequest) -> Result<(), OperationFailed> {
        match request {
            ConfirmationRequest::AddTask { column_id, task } => {
                self.remote.add_task(column_id, task).await.map(|_| ())
            }
            ConfirmationRequest::MoveTask {
                task_id,
                from_column,
                to_column,
            } => self
                .remote
                .move_task(task_id, from_column, to_column)
                .await
                .map(|_| ()),
            ConfirmationRequest::DeleteTask { task_id, column_id } => self
                .remote
                .delete_task(task_id, column_id)
                .await
                .map(|_| ()),
        }
    }
}

fn task_at(board: &Board, column_id: &ColumnId, task_id: &TaskId) -> Option<(Task, usize)> {
    let column = board.column(column_id)?;
    let index = column.position(task_id)?;
    Some((column.items[index].clone(), index))
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
