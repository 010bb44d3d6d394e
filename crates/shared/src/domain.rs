use std::{collections::HashSet, fmt, sync::Arc};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(ColumnId);
id_newtype!(TaskId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub content: String,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub items: Vec<Task>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn with_items(name: impl Into<String>, items: Vec<Task>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }

    pub fn position(&self, task_id: &TaskId) -> Option<usize> {
        self.items.iter().position(|task| &task.id == task_id)
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.position(task_id).is_some()
    }

    pub fn task_ids(&self) -> Vec<&str> {
        self.items.iter().map(|task| task.id.as_str()).collect()
    }
}

/// Ordered set of columns. Column order is display order and never changes
/// after construction; columns are shared between board values until a
/// transition replaces them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    columns: IndexMap<ColumnId, Arc<Column>>,
}

impl Board {
    pub fn from_columns<I, K>(columns: I) -> Self
    where
        I: IntoIterator<Item = (K, Column)>,
        K: Into<ColumnId>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|(id, column)| (id.into(), Arc::new(column)))
                .collect(),
        }
    }

    /// The board a fresh install starts with.
    pub fn seeded() -> Self {
        Self::from_columns([
            (
                "todo",
                Column::with_items(
                    "To Do",
                    vec![
                        Task::new("1", "Market research"),
                        Task::new("2", "Write Projects"),
                    ],
                ),
            ),
            (
                "inprogress",
                Column::with_items("In Progress", vec![Task::new("3", "Design UI")]),
            ),
            (
                "done",
                Column::with_items("Done", vec![Task::new("4", "Set Up")]),
            ),
        ])
    }

    pub fn column(&self, column_id: &ColumnId) -> Option<&Column> {
        self.columns.get(column_id).map(Arc::as_ref)
    }

    pub fn column_handle(&self, column_id: &ColumnId) -> Option<&Arc<Column>> {
        self.columns.get(column_id)
    }

    pub fn contains_column(&self, column_id: &ColumnId) -> bool {
        self.columns.contains_key(column_id)
    }

    pub fn column_ids(&self) -> impl Iterator<Item = &ColumnId> {
        self.columns.keys()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&ColumnId, &Column)> {
        self.columns.iter().map(|(id, column)| (id, column.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Finds the column holding `task_id` and the task's index in it.
    pub fn locate_task(&self, task_id: &TaskId) -> Option<(&ColumnId, usize)> {
        self.columns
            .iter()
            .find_map(|(column_id, column)| column.position(task_id).map(|idx| (column_id, idx)))
    }

    pub fn find_task(&self, task_id: &TaskId) -> Option<&Task> {
        self.locate_task(task_id)
            .and_then(|(column_id, idx)| self.columns.get(column_id)?.items.get(idx))
    }

    pub fn contains_task(&self, task_id: &TaskId) -> bool {
        self.locate_task(task_id).is_some()
    }

    pub fn task_count(&self) -> usize {
        self.columns.values().map(|column| column.items.len()).sum()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.columns.values().flat_map(|column| column.items.iter())
    }

    /// First task id that appears more than once, if any.
    pub fn duplicate_task_id(&self) -> Option<&TaskId> {
        let mut seen = HashSet::new();
        self.tasks()
            .map(|task| &task.id)
            .find(|task_id| !seen.insert(*task_id))
    }

    /// Returns a new board with `column_id` replaced. Every other column keeps
    /// its existing allocation. Unknown ids return `None`.
    pub fn with_column(&self, column_id: &ColumnId, column: Column) -> Option<Self> {
        if !self.columns.contains_key(column_id) {
            return None;
        }
        let mut columns = self.columns.clone();
        columns.insert(column_id.clone(), Arc::new(column));
        Some(Self { columns })
    }
}

impl PartialEq for Board {
    // IndexMap equality ignores order; boards compare in display order.
    fn eq(&self, other: &Self) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(other.columns.iter())
                .all(|((a_id, a), (b_id, b))| a_id == b_id && a == b)
    }
}

impl Eq for Board {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_board_keeps_display_order_through_json() {
        let board = Board::seeded();
        let raw = serde_json::to_string(&board).expect("serialize");
        assert!(raw.starts_with(r#"{"todo":{"name":"To Do","items":[{"id":"1""#));

        let restored: Board = serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(restored, board);
        let order: Vec<&str> = restored.column_ids().map(ColumnId::as_str).collect();
        assert_eq!(order, ["todo", "inprogress", "done"]);
    }

    #[test]
    fn boards_with_reordered_columns_are_not_equal() {
        let a = Board::from_columns([("a", Column::new("A")), ("b", Column::new("B"))]);
        let b = Board::from_columns([("b", Column::new("B")), ("a", Column::new("A"))]);
        assert_ne!(a, b);
    }

    #[test]
    fn with_column_shares_untouched_columns() {
        let board = Board::seeded();
        let todo = ColumnId::from("todo");
        let next = board
            .with_column(&todo, Column::new("Renamed"))
            .expect("known column");

        for id in ["inprogress", "done"] {
            let id = ColumnId::from(id);
            assert!(Arc::ptr_eq(
                board.column_handle(&id).expect("before"),
                next.column_handle(&id).expect("after"),
            ));
        }
        assert_eq!(board.column(&todo).map(|c| c.name.as_str()), Some("To Do"));
        assert!(board.with_column(&ColumnId::from("archive"), Column::new("x")).is_none());
    }

    #[test]
    fn detects_duplicate_task_ids_across_columns() {
        let board = Board::from_columns([
            ("a", Column::with_items("A", vec![Task::new("7", "one")])),
            ("b", Column::with_items("B", vec![Task::new("7", "two")])),
        ]);
        assert_eq!(board.duplicate_task_id(), Some(&TaskId::from("7")));
        assert_eq!(Board::seeded().duplicate_task_id(), None);
    }

    #[test]
    fn locates_tasks_by_id() {
        let board = Board::seeded();
        let (column, idx) = board.locate_task(&TaskId::from("2")).expect("present");
        assert_eq!(column.as_str(), "todo");
        assert_eq!(idx, 1);
        assert_eq!(board.task_count(), 4);
        assert!(!board.contains_task(&TaskId::from("99")));
    }
}
