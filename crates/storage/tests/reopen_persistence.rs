use std::time::{SystemTime, UNIX_EPOCH};

use storage::{prepare_database_url, Storage};

#[tokio::test]
async fn values_survive_reopening_the_database_file() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("board_storage_reopen_{suffix}"));
    let db_path = temp_root.join("data").join("board.db");

    let database_url = prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare");
    assert!(temp_root.join("data").exists());

    let storage = Storage::new(&database_url).await.expect("open");
    storage
        .put_value("kanbanColumns", r#"{"todo":{"name":"To Do","items":[]}}"#)
        .await
        .expect("write");
    storage.pool().close().await;

    let reopened = Storage::new(&database_url).await.expect("reopen");
    assert_eq!(
        reopened.get_value("kanbanColumns").await.expect("read"),
        Some(r#"{"todo":{"name":"To Do","items":[]}}"#.to_string())
    );
    reopened.pool().close().await;

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}
