use std::sync::{Arc, Mutex};

use anyhow::Result;
use shared::domain::Board;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    error::TransitionError,
    transition::{apply, BoardAction},
    BoardPersistence,
};

/// The board values on either side of one applied action.
#[derive(Debug, Clone)]
pub struct Transition {
    pub previous: Board,
    pub current: Board,
}

enum PersistCommand {
    Save(Board),
    Flush(oneshot::Sender<()>),
}

/// Owner of the current board value. All writes go through [`BoardStore::dispatch`],
/// which replaces the value atomically and queues the result for the durable
/// store. Writes reach the durable store in dispatch order.
pub struct BoardStore {
    state: watch::Sender<Board>,
    dispatch_lock: Mutex<()>,
    writes: mpsc::UnboundedSender<PersistCommand>,
    _writer: JoinHandle<()>,
}

impl BoardStore {
    /// Loads the persisted board, or starts from [`Board::seeded`] when
    /// nothing usable is stored. Must be called inside a tokio runtime.
    pub async fn initialize(persistence: Arc<dyn BoardPersistence>) -> Result<Arc<Self>> {
        let loaded = persistence.load_board().await?;
        let needs_seed_write = loaded.is_none();
        let board = loaded.unwrap_or_else(|| {
            info!("no stored board; starting from the default board");
            Board::seeded()
        });

        let store = Self::with_board(board, persistence);
        if needs_seed_write {
            store.queue_write(store.current());
        }
        Ok(store)
    }

    pub fn with_board(board: Board, persistence: Arc<dyn BoardPersistence>) -> Arc<Self> {
        let (state, _) = watch::channel(board);
        let (writes, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(run_writer(rx, persistence));
        Arc::new(Self {
            state,
            dispatch_lock: Mutex::new(()),
            writes,
            _writer: writer,
        })
    }

    pub fn current(&self) -> Board {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Board> {
        self.state.subscribe()
    }

    /// Applies `action` to the current board. The returned `previous` value is
    /// the exact board the action was applied to. On error the board is left
    /// as it was and nothing is persisted.
    pub fn dispatch(&self, action: BoardAction) -> Result<Transition, TransitionError> {
        let name = action.name();
        // Held across apply, queue and publish so durable writes follow the
        // same order as state changes.
        let _guard = self
            .dispatch_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let previous = self.current();
        let current = match apply(&previous, action) {
            Ok(board) => board,
            Err(err) => {
                warn!(action = name, error = %err, "board transition rejected");
                return Err(err);
            }
        };
        self.queue_write(current.clone());
        self.state.send_replace(current.clone());

        debug!(
            action = name,
            tasks = current.task_count(),
            "board transition applied"
        );
        Ok(Transition { previous, current })
    }

    /// Resolves once every write queued before this call has been attempted.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.writes.send(PersistCommand::Flush(ack)).is_err() {
            return;
        }
        let _ = done.await;
    }

    fn queue_write(&self, board: Board) {
        if self.writes.send(PersistCommand::Save(board)).is_err() {
            warn!("board writer stopped; durable copy is no longer updated");
        }
    }
}

async fn run_writer(
    mut rx: mpsc::UnboundedReceiver<PersistCommand>,
    persistence: Arc<dyn BoardPersistence>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            PersistCommand::Save(board) => {
                if let Err(error) = persistence.save_board(&board).await {
                    error!(%error, "failed to persist board");
                }
            }
            PersistCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("board writer stopped");
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
