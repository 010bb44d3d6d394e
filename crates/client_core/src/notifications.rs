//! Transient user-facing notifications with automatic expiry.

use std::{
    collections::HashMap,
    fmt,
    str::FromStr,
    sync::{Arc, Mutex as StdMutex, Weak},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{sync::watch, task::JoinHandle};
use tracing::debug;
use uuid::Uuid;

pub const QUEUE_NOTIFICATION_TTL: Duration = Duration::from_millis(4000);
pub const SINGLE_SLOT_NOTIFICATION_TTL: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub Uuid);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMode {
    /// Any number of notifications, each expiring on its own timer.
    #[default]
    Queue,
    /// At most one notification; a new one replaces the current one.
    SingleSlot,
}

impl NotificationMode {
    pub fn default_ttl(self) -> Duration {
        match self {
            NotificationMode::Queue => QUEUE_NOTIFICATION_TTL,
            NotificationMode::SingleSlot => SINGLE_SLOT_NOTIFICATION_TTL,
        }
    }
}

impl FromStr for NotificationMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "queue" => Ok(NotificationMode::Queue),
            "single" | "single_slot" | "single-slot" => Ok(NotificationMode::SingleSlot),
            other => Err(format!("unknown notification mode '{other}'")),
        }
    }
}

/// Cheap to clone; clones share the same active list.
#[derive(Clone)]
pub struct NotificationQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    mode: NotificationMode,
    ttl: Duration,
    active: watch::Sender<Vec<Notification>>,
    timers: StdMutex<HashMap<NotificationId, JoinHandle<()>>>,
}

impl NotificationQueue {
    pub fn new(mode: NotificationMode, ttl: Duration) -> Self {
        let (active, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(QueueInner {
                mode,
                ttl,
                active,
                timers: StdMutex::new(HashMap::new()),
            }),
        }
    }

    pub fn with_mode(mode: NotificationMode) -> Self {
        Self::new(mode, mode.default_ttl())
    }

    pub fn mode(&self) -> NotificationMode {
        self.inner.mode
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Adds a notification and schedules its removal after the queue's TTL.
    /// Must be called inside a tokio runtime.
    pub fn enqueue(&self, message: impl Into<String>, severity: Severity) -> NotificationId {
        let notification = Notification {
            id: NotificationId(Uuid::new_v4()),
            message: message.into(),
            severity,
            created_at: Utc::now(),
        };
        let id = notification.id;

        let mut timers = self.inner.lock_timers();
        match self.inner.mode {
            NotificationMode::Queue => {
                self.inner.active.send_modify(|list| list.push(notification));
            }
            NotificationMode::SingleSlot => {
                for (superseded, timer) in timers.drain() {
                    debug!(%superseded, "notification superseded");
                    timer.abort();
                }
                self.inner
                    .active
                    .send_modify(|list| *list = vec![notification]);
            }
        }

        let weak = Arc::downgrade(&self.inner);
        let ttl = self.inner.ttl;
        timers.insert(id, tokio::spawn(expire_after(weak, id, ttl)));
        debug!(%id, ttl_ms = ttl.as_millis() as u64, "notification enqueued");
        id
    }

    /// Removes a notification before it expires. Returns whether it was active.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        if let Some(timer) = self.inner.lock_timers().remove(&id) {
            timer.abort();
        }
        self.inner.remove(id)
    }

    pub fn active(&self) -> Vec<Notification> {
        self.inner.active.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> {
        self.inner.active.subscribe()
    }

    pub fn clear(&self) {
        for (_, timer) in self.inner.lock_timers().drain() {
            timer.abort();
        }
        self.inner.active.send_if_modified(|list| {
            let had_any = !list.is_empty();
            list.clear();
            had_any
        });
    }
}

impl QueueInner {
    fn lock_timers(&self) -> std::sync::MutexGuard<'_, HashMap<NotificationId, JoinHandle<()>>> {
        self.timers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove(&self, id: NotificationId) -> bool {
        self.active.send_if_modified(|list| {
            let before = list.len();
            list.retain(|notification| notification.id != id);
            list.len() != before
        })
    }
}

async fn expire_after(inner: Weak<QueueInner>, id: NotificationId, ttl: Duration) {
    tokio::time::sleep(ttl).await;
    let Some(inner) = inner.upgrade() else {
        return;
    };
    inner.lock_timers().remove(&id);
    if inner.remove(id) {
        debug!(%id, "notification expired");
    }
}

#[cfg(test)]
#[path = "tests/notifications_tests.rs"]
mod tests;
