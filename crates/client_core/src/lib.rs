use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use shared::{
    domain::{Board, ColumnId, Task, TaskId},
    error::OperationFailed,
    protocol::{DeleteReceipt, MoveReceipt},
};
use storage::{prepare_database_url, Storage};
use tracing::info;

mod board_persistence;
pub mod config;
pub mod confirmation;
pub mod coordinator;
pub mod error;
pub mod notifications;
pub mod session;
pub mod store;
mod task_ids;
pub mod transition;

pub use board_persistence::{MemoryBoardPersistence, SqliteBoardPersistence, BOARD_KEY};
pub use config::{load_settings, EngineSettings};
pub use confirmation::{RemoteProfile, ScriptedOutcome, ScriptedRemote, SimulatedRemote};
pub use coordinator::{BoardEvent, MutationCoordinator, MutationOutcome, RollbackStrategy};
pub use notifications::{Notification, NotificationId, NotificationMode, NotificationQueue, Severity};
pub use session::Session;
pub use store::{BoardStore, Transition};
pub use task_ids::TaskIdGenerator;

/// Durable home of the board between runs.
#[async_trait]
pub trait BoardPersistence: Send + Sync {
    /// `None` when nothing usable is stored.
    async fn load_board(&self) -> Result<Option<Board>>;
    async fn save_board(&self, board: &Board) -> Result<()>;
}

/// The remote service that accepts or refuses each optimistic mutation.
#[async_trait]
pub trait RemoteConfirmation: Send + Sync {
    async fn add_task(&self, column_id: &ColumnId, task: &Task) -> Result<Task, OperationFailed>;
    async fn move_task(
        &self,
        task_id: &TaskId,
        from_column: &ColumnId,
        to_column: &ColumnId,
    ) -> Result<MoveReceipt, OperationFailed>;
    async fn delete_task(
        &self,
        task_id: &TaskId,
        column_id: &ColumnId,
    ) -> Result<DeleteReceipt, OperationFailed>;
}

/// Everything a board front end needs, wired together.
pub struct BoardClient {
    store: Arc<BoardStore>,
    coordinator: Arc<MutationCoordinator>,
    notifications: NotificationQueue,
    session: Session,
}

impl BoardClient {
    /// Opens the SQLite store named by `settings` and confirms mutations with
    /// the simulated remote.
    pub async fn initialize(settings: &EngineSettings) -> Result<Self> {
        let database_url = prepare_database_url(&settings.database_url)?;
        let storage = Storage::new(&database_url)
            .await
            .with_context(|| format!("failed to open board storage at '{database_url}'"))?;
        storage.health_check().await?;
        info!(%database_url, "board storage ready");

        Self::with_dependencies(
            settings,
            Arc::new(SqliteBoardPersistence::new(storage.clone())),
            Arc::new(SimulatedRemote::new(settings.remote_profile())),
            Session::new(storage),
        )
        .await
    }

    pub async fn with_dependencies(
        settings: &EngineSettings,
        persistence: Arc<dyn BoardPersistence>,
        remote: Arc<dyn RemoteConfirmation>,
        session: Session,
    ) -> Result<Self> {
        let store = BoardStore::initialize(persistence).await?;
        let notifications =
            NotificationQueue::new(settings.notification_mode, settings.notification_ttl());
        let coordinator = Arc::new(
            MutationCoordinator::new(Arc::clone(&store), remote, notifications.clone())
                .with_strategy(settings.rollback_strategy),
        );

        Ok(Self {
            store,
            coordinator,
            notifications,
            session,
        })
    }

    pub fn store(&self) -> &Arc<BoardStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<MutationCoordinator> {
        &self.coordinator
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn board(&self) -> Board {
        self.store.current()
    }

    /// Waits until every board change made so far has reached the durable store.
    pub async fn shutdown(&self) {
        self.store.flush().await;
        self.notifications.clear();
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
