use std::time::{Duration, SystemTime, UNIX_EPOCH};

use shared::domain::TaskId;

use super::*;

fn instant_settings(database_url: String) -> EngineSettings {
    EngineSettings {
        database_url,
        confirm_min_delay_ms: 0,
        confirm_max_delay_ms: 0,
        failure_probability: 0.0,
        ..EngineSettings::default()
    }
}

#[tokio::test]
async fn wires_settings_into_every_component() {
    let settings = EngineSettings {
        notification_mode: NotificationMode::SingleSlot,
        notification_ttl_ms: Some(750),
        rollback_strategy: RollbackStrategy::Compensate,
        ..EngineSettings::default()
    };
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let client = BoardClient::with_dependencies(
        &settings,
        Arc::new(MemoryBoardPersistence::new()),
        Arc::new(ScriptedRemote::succeeding()),
        Session::new(storage),
    )
    .await
    .expect("client");

    assert_eq!(client.board(), Board::seeded());
    assert_eq!(client.notifications().mode(), NotificationMode::SingleSlot);
    assert_eq!(client.notifications().ttl(), Duration::from_millis(750));
    assert_eq!(client.coordinator().strategy(), RollbackStrategy::Compensate);
    assert!(Arc::ptr_eq(client.store(), client.coordinator().store()));
}

#[tokio::test]
async fn rolled_back_mutation_surfaces_through_client_notifications() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let client = BoardClient::with_dependencies(
        &EngineSettings::default(),
        Arc::new(MemoryBoardPersistence::new()),
        Arc::new(ScriptedRemote::failing()),
        Session::new(storage),
    )
    .await
    .expect("client");

    client
        .coordinator()
        .delete_task(&"todo".into(), &TaskId::from("2"))
        .await
        .expect("delete");

    assert_eq!(client.board(), Board::seeded());
    let active = client.notifications().active();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].message, "Failed to delete task. Please try again.");

    client.shutdown().await;
    assert!(client.notifications().active().is_empty());
}

#[tokio::test]
async fn board_and_session_survive_restart() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("board_client_restart_{suffix}"));
    let db_path = temp_root.join("data").join("board.db");
    let settings = instant_settings(db_path.to_string_lossy().into_owned());

    let client = BoardClient::initialize(&settings).await.expect("first start");
    assert_eq!(client.board(), Board::seeded());
    let (task, outcome) = client
        .coordinator()
        .add_task(&"inprogress".into(), "Review PR")
        .await
        .expect("add");
    assert!(outcome.is_committed());
    client.session().login("carol").await.expect("login");
    client.shutdown().await;
    drop(client);

    let restarted = BoardClient::initialize(&settings).await.expect("second start");
    let board = restarted.board();
    assert_eq!(board.find_task(&task.id), Some(&task));
    assert_eq!(
        board.locate_task(&task.id).map(|(column, _)| column.as_str()),
        Some("inprogress")
    );
    assert_eq!(
        restarted.session().current_user().await.expect("session"),
        Some("carol".to_string())
    );
    restarted.shutdown().await;
    drop(restarted);

    let _ = std::fs::remove_dir_all(temp_root);
}
