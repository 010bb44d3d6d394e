use anyhow::{Context, Result};
use async_trait::async_trait;
use shared::domain::Board;
use storage::Storage;
use tokio::sync::Mutex;
use tracing::warn;

use crate::BoardPersistence;

pub const BOARD_KEY: &str = "kanbanColumns";

/// Board persisted as JSON under a single key of the local key-value store.
pub struct SqliteBoardPersistence {
    store: Storage,
    key: String,
}

impl SqliteBoardPersistence {
    pub fn new(store: Storage) -> Self {
        Self {
            store,
            key: BOARD_KEY.to_string(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.store
    }
}

#[async_trait]
impl BoardPersistence for SqliteBoardPersistence {
    async fn load_board(&self) -> Result<Option<Board>> {
        let raw = self.store.get_value(&self.key).await?;
        Ok(raw.and_then(|raw| decode_board(&self.key, &raw)))
    }

    async fn save_board(&self, board: &Board) -> Result<()> {
        let raw = serde_json::to_string(board).context("failed to encode board")?;
        self.store.put_value(&self.key, &raw).await
    }
}

/// In-process persistence that keeps the encoded board and a log of every save.
#[derive(Default)]
pub struct MemoryBoardPersistence {
    raw: Mutex<Option<String>>,
    saves: Mutex<Vec<Board>>,
}

impl MemoryBoardPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `raw` as the stored value, whether or not it parses.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
            saves: Mutex::new(Vec::new()),
        }
    }

    pub fn with_board(board: &Board) -> Result<Self> {
        Ok(Self::with_raw(
            serde_json::to_string(board).context("failed to encode board")?,
        ))
    }

    pub async fn raw(&self) -> Option<String> {
        self.raw.lock().await.clone()
    }

    pub async fn saved_boards(&self) -> Vec<Board> {
        self.saves.lock().await.clone()
    }

    pub async fn last_saved(&self) -> Option<Board> {
        self.saves.lock().await.last().cloned()
    }
}

#[async_trait]
impl BoardPersistence for MemoryBoardPersistence {
    async fn load_board(&self) -> Result<Option<Board>> {
        Ok(self
            .raw
            .lock()
            .await
            .as_deref()
            .and_then(|raw| decode_board("memory", raw)))
    }

    async fn save_board(&self, board: &Board) -> Result<()> {
        let raw = serde_json::to_string(board).context("failed to encode board")?;
        *self.raw.lock().await = Some(raw);
        self.saves.lock().await.push(board.clone());
        Ok(())
    }
}

/// Unusable stored content is treated as absent so startup falls back to the
/// default board.
fn decode_board(key: &str, raw: &str) -> Option<Board> {
    let board: Board = match serde_json::from_str(raw) {
        Ok(board) => board,
        Err(error) => {
            warn!(key, %error, "stored board is malformed; ignoring it");
            return None;
        }
    };
    if board.is_empty() {
        warn!(key, "stored board has no columns; ignoring it");
        return None;
    }
    if let Some(task_id) = board.duplicate_task_id() {
        warn!(key, %task_id, "stored board repeats a task id; ignoring it");
        return None;
    }
    Some(board)
}

#[cfg(test)]
#[path = "tests/board_persistence_tests.rs"]
mod tests;
