use async_trait::async_trait;
use shared::domain::{Column, ColumnId, Task, TaskId};

use super::*;
use crate::MemoryBoardPersistence;

fn col(id: &str) -> ColumnId {
    ColumnId::from(id)
}

fn small_board() -> Board {
    Board::from_columns([
        ("backlog", Column::with_items("Backlog", vec![Task::new("10", "triage")])),
        ("shipped", Column::new("Shipped")),
    ])
}

struct BrokenPersistence;

#[async_trait]
impl BoardPersistence for BrokenPersistence {
    async fn load_board(&self) -> Result<Option<Board>> {
        Ok(None)
    }

    async fn save_board(&self, _board: &Board) -> Result<()> {
        anyhow::bail!("disk full")
    }
}

#[tokio::test]
async fn empty_persistence_starts_from_seed_and_writes_it() {
    let persistence = Arc::new(MemoryBoardPersistence::new());
    let store = BoardStore::initialize(persistence.clone())
        .await
        .expect("initialize");

    assert_eq!(store.current(), Board::seeded());
    store.flush().await;
    assert_eq!(persistence.saved_boards().await, vec![Board::seeded()]);
}

#[tokio::test]
async fn stored_board_is_loaded_without_rewriting() {
    let persistence = Arc::new(MemoryBoardPersistence::with_board(&small_board()).expect("encode"));
    let store = BoardStore::initialize(persistence.clone())
        .await
        .expect("initialize");

    assert_eq!(store.current(), small_board());
    store.flush().await;
    assert!(persistence.saved_boards().await.is_empty());
}

#[tokio::test]
async fn malformed_stored_board_falls_back_to_seed() {
    let persistence = Arc::new(MemoryBoardPersistence::with_raw("{\"todo\": [1, 2"));
    let store = BoardStore::initialize(persistence.clone())
        .await
        .expect("initialize");

    assert_eq!(store.current(), Board::seeded());
    store.flush().await;
    assert_eq!(persistence.last_saved().await, Some(Board::seeded()));
}

#[tokio::test]
async fn dispatch_reports_both_sides_and_notifies_subscribers() {
    let persistence = Arc::new(MemoryBoardPersistence::new());
    let store = BoardStore::with_board(small_board(), persistence);
    let mut rx = store.subscribe();

    let transition = store
        .dispatch(BoardAction::AddTaskOptimistic {
            column_id: col("shipped"),
            task: Task::new("11", "release"),
        })
        .expect("add");

    assert_eq!(transition.previous, small_board());
    assert_eq!(transition.current, store.current());
    assert!(transition.current.contains_task(&TaskId::from("11")));
    assert!(rx.has_changed().expect("sender alive"));
    assert_eq!(*rx.borrow_and_update(), transition.current);
}

#[tokio::test]
async fn rejected_action_changes_and_writes_nothing() {
    let persistence = Arc::new(MemoryBoardPersistence::new());
    let store = BoardStore::with_board(small_board(), persistence.clone());
    let mut rx = store.subscribe();
    rx.borrow_and_update();

    let err = store
        .dispatch(BoardAction::DeleteTaskOptimistic {
            column_id: col("archive"),
            task_id: TaskId::from("10"),
        })
        .expect_err("unknown column");

    assert_eq!(err, TransitionError::UnknownColumn(col("archive")));
    assert_eq!(store.current(), small_board());
    assert!(!rx.has_changed().expect("sender alive"));
    store.flush().await;
    assert!(persistence.saved_boards().await.is_empty());
}

#[tokio::test]
async fn every_transition_is_persisted_in_dispatch_order() {
    let persistence = Arc::new(MemoryBoardPersistence::new());
    let store = BoardStore::with_board(small_board(), persistence.clone());

    let mut expected = Vec::new();
    for action in [
        BoardAction::AddTaskOptimistic {
            column_id: col("backlog"),
            task: Task::new("11", "write docs"),
        },
        BoardAction::MoveTaskOptimistic {
            source_column: col("backlog"),
            target_column: col("shipped"),
            item: Task::new("10", "triage"),
        },
        BoardAction::Rollback(small_board()),
    ] {
        expected.push(store.dispatch(action).expect("apply").current);
    }

    store.flush().await;
    assert_eq!(persistence.saved_boards().await, expected);
    assert_eq!(persistence.last_saved().await, Some(small_board()));
}

#[tokio::test]
async fn persistence_failures_do_not_block_state_changes() {
    let store = BoardStore::initialize(Arc::new(BrokenPersistence))
        .await
        .expect("initialize");

    store
        .dispatch(BoardAction::DeleteTaskOptimistic {
            column_id: col("todo"),
            task_id: TaskId::from("1"),
        })
        .expect("delete");
    store.flush().await;

    assert!(!store.current().contains_task(&TaskId::from("1")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dispatches_chain_and_persist_in_order() {
    let persistence = Arc::new(MemoryBoardPersistence::new());
    let store = BoardStore::with_board(small_board(), persistence.clone());

    let handles: Vec<_> = (0..16)
        .map(|n| {
            let store = Arc::clone(&store);
            tokio::task::spawn_blocking(move || {
                store
                    .dispatch(BoardAction::AddTaskOptimistic {
                        column_id: col("shipped"),
                        task: Task::new(format!("{}", 100 + n), "parallel"),
                    })
                    .expect("add")
            })
        })
        .collect();

    let mut transitions = Vec::new();
    for handle in handles {
        transitions.push(handle.await.expect("join"));
    }

    for transition in &transitions {
        assert_eq!(
            transition.current.task_count(),
            transition.previous.task_count() + 1
        );
    }
    assert_eq!(store.current().task_count(), small_board().task_count() + 16);

    store.flush().await;
    let saved = persistence.saved_boards().await;
    assert_eq!(saved.len(), 16);
    for (n, board) in saved.iter().enumerate() {
        assert_eq!(board.task_count(), small_board().task_count() + n + 1);
    }
    assert_eq!(saved.last(), Some(&store.current()));
}
