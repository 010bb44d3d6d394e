//! Pure board transitions. Nothing here touches I/O or shared state: every
//! function takes a board by reference and returns a new one.

use shared::domain::{Board, Column, ColumnId, Task, TaskId};

use crate::error::TransitionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardAction {
    AddTaskOptimistic {
        column_id: ColumnId,
        task: Task,
    },
    MoveTaskOptimistic {
        source_column: ColumnId,
        target_column: ColumnId,
        item: Task,
    },
    DeleteTaskOptimistic {
        column_id: ColumnId,
        task_id: TaskId,
    },
    /// Replace the whole board, discarding anything applied since `0` was taken.
    Rollback(Board),
    /// Undo one mutation's own effect, leaving unrelated changes in place.
    Compensate(Vec<Compensation>),
}

impl BoardAction {
    pub fn name(&self) -> &'static str {
        match self {
            BoardAction::AddTaskOptimistic { .. } => "add_task_optimistic",
            BoardAction::MoveTaskOptimistic { .. } => "move_task_optimistic",
            BoardAction::DeleteTaskOptimistic { .. } => "delete_task_optimistic",
            BoardAction::Rollback(_) => "rollback",
            BoardAction::Compensate(_) => "compensate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    /// Drop the task from whichever column currently holds it.
    Remove { task_id: TaskId },
    /// Put a task back at `index` (clamped), unless its id is already present.
    Restore {
        column_id: ColumnId,
        task: Task,
        index: usize,
    },
    /// Return a moved task from `from_column` to `to_column` at `index`
    /// (clamped). A no-op once the task has left `from_column`.
    MoveBack {
        task: Task,
        from_column: ColumnId,
        to_column: ColumnId,
        index: usize,
    },
}

pub fn apply(board: &Board, action: BoardAction) -> Result<Board, TransitionError> {
    match action {
        BoardAction::AddTaskOptimistic { column_id, task } => add_task(board, &column_id, task),
        BoardAction::MoveTaskOptimistic {
            source_column,
            target_column,
            item,
        } => move_task(board, &source_column, &target_column, item),
        BoardAction::DeleteTaskOptimistic { column_id, task_id } => {
            delete_task(board, &column_id, &task_id)
        }
        BoardAction::Rollback(snapshot) => Ok(snapshot),
        BoardAction::Compensate(steps) => steps
            .into_iter()
            .try_fold(board.clone(), |current, step| compensate(&current, step)),
    }
}

fn column<'a>(board: &'a Board, column_id: &ColumnId) -> Result<&'a Column, TransitionError> {
    board
        .column(column_id)
        .ok_or_else(|| TransitionError::UnknownColumn(column_id.clone()))
}

fn replace_column(
    board: &Board,
    column_id: &ColumnId,
    column: Column,
) -> Result<Board, TransitionError> {
    board
        .with_column(column_id, column)
        .ok_or_else(|| TransitionError::UnknownColumn(column_id.clone()))
}

fn add_task(board: &Board, column_id: &ColumnId, task: Task) -> Result<Board, TransitionError> {
    let mut next = column(board, column_id)?.clone();
    if board.contains_task(&task.id) {
        return Err(TransitionError::DuplicateTaskId(task.id));
    }
    next.items.push(task);
    replace_column(board, column_id, next)
}

fn move_task(
    board: &Board,
    source_column: &ColumnId,
    target_column: &ColumnId,
    item: Task,
) -> Result<Board, TransitionError> {
    if source_column == target_column {
        return Err(TransitionError::SameColumnMove(source_column.clone()));
    }
    let mut source = column(board, source_column)?.clone();
    let mut target = column(board, target_column)?.clone();

    if let Some(idx) = source.position(&item.id) {
        source.items.remove(idx);
    }
    let held_elsewhere = board
        .locate_task(&item.id)
        .is_some_and(|(holder, _)| holder != source_column);
    if held_elsewhere || source.contains(&item.id) {
        return Err(TransitionError::DuplicateTaskId(item.id));
    }

    target.items.push(item);
    replace_column(
        &replace_column(board, source_column, source)?,
        target_column,
        target,
    )
}

fn delete_task(
    board: &Board,
    column_id: &ColumnId,
    task_id: &TaskId,
) -> Result<Board, TransitionError> {
    let current = column(board, column_id)?;
    let Some(idx) = current.position(task_id) else {
        return Ok(board.clone());
    };
    let mut next = current.clone();
    next.items.remove(idx);
    replace_column(board, column_id, next)
}

fn compensate(board: &Board, step: Compensation) -> Result<Board, TransitionError> {
    match step {
        Compensation::Remove { task_id } => match board.locate_task(&task_id) {
            Some((holder, _)) => {
                let holder = holder.clone();
                delete_task(board, &holder, &task_id)
            }
            None => Ok(board.clone()),
        },
        Compensation::Restore {
            column_id,
            task,
            index,
        } => {
            let mut next = column(board, &column_id)?.clone();
            if board.contains_task(&task.id) {
                return Ok(board.clone());
            }
            let index = index.min(next.items.len());
            next.items.insert(index, task);
            replace_column(board, &column_id, next)
        }
        Compensation::MoveBack {
            task,
            from_column,
            to_column,
            index,
        } => {
            let mut from = column(board, &from_column)?.clone();
            let mut to = column(board, &to_column)?.clone();
            let Some(position) = from.position(&task.id) else {
                return Ok(board.clone());
            };
            from.items.remove(position);
            let index = index.min(to.items.len());
            to.items.insert(index, task);
            replace_column(
                &replace_column(board, &from_column, from)?,
                &to_column,
                to,
            )
        }
    }
}

#[cfg(test)]
#[path = "tests/transition_tests.rs"]
mod tests;
