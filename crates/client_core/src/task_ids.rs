use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use shared::domain::{Board, TaskId};

/// Issues task ids rendered from the wall clock in milliseconds. Ids from one
/// generator strictly increase: a call landing in the same millisecond as the
/// previous one (or after the clock stepped back) gets `last + 1`.
pub struct TaskIdGenerator {
    last: AtomicI64,
    clock: fn() -> i64,
}

impl Default for TaskIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskIdGenerator {
    pub fn new() -> Self {
        Self::with_clock(|| Utc::now().timestamp_millis())
    }

    pub fn with_clock(clock: fn() -> i64) -> Self {
        Self {
            last: AtomicI64::new(0),
            clock,
        }
    }

    /// Never issue an id at or below any numeric id already on `board`.
    pub fn observe(&self, board: &Board) {
        if let Some(max) = board
            .tasks()
            .filter_map(|task| task.id.as_str().parse::<i64>().ok())
            .max()
        {
            self.last.fetch_max(max, Ordering::SeqCst);
        }
    }

    pub fn next_id(&self) -> TaskId {
        let now = (self.clock)();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        TaskId::new(now.max(previous.saturating_add(1)).to_string())
    }
}
