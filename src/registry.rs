//! Session registry: live playback tasks per destination.
//!
//! Every running playback holds a [`Registration`] under its
//! [`DestinationKey`]. A stop command cancels every task under a key in one
//! atomic step; each task then winds down through its own cleanup path, and
//! dropping its registration removes it from the registry.
//!
//! Invariants:
//! - a key present in the map always has at least one task
//! - a task id is registered under exactly one key
//! - every mutation happens under a single lock
//!
//! ```rust
//! use std::sync::Arc;
//! use glyphcast::registry::SessionRegistry;
//! use glyphcast::types::DestinationKey;
//!
//! let registry = Arc::new(SessionRegistry::new());
//! let key = DestinationKey::group("qq", "42");
//!
//! let first = registry.register(key.clone());
//! let second = registry.register(key.clone());
//! assert_eq!(registry.active_tasks(&key), 2);
//!
//! assert_eq!(registry.cancel_all(&key), 2);
//! assert!(first.token().is_cancelled() && second.token().is_cancelled());
//! assert!(!registry.contains(&key));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::DestinationKey;

/// Identity of one playback task, unique for the life of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

type TaskSet = HashMap<TaskId, CancellationToken>;

/// Process-wide map from destination to its running playback tasks.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<DestinationKey, TaskSet>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new task under `key`.
    ///
    /// The returned [`Registration`] carries the task's cancellation token and
    /// unregisters the task when dropped.
    pub fn register(self: &Arc<Self>, key: DestinationKey) -> Registration {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let token = CancellationToken::new();

        let active = {
            let mut sessions = self.sessions.lock();
            let tasks = sessions.entry(key.clone()).or_default();
            tasks.insert(id, token.clone());
            tasks.len()
        };
        debug!("Registered {} under {} ({} active)", id, key, active);

        Registration { registry: Arc::clone(self), key, id, token }
    }

    /// Remove a task. No-op when the task (or its key) is already gone.
    ///
    /// Returns whether the task was present.
    pub fn unregister(&self, key: &DestinationKey, id: TaskId) -> bool {
        let mut sessions = self.sessions.lock();
        let Some(tasks) = sessions.get_mut(key) else {
            return false;
        };

        let removed = tasks.remove(&id).is_some();
        if tasks.is_empty() {
            sessions.remove(key);
        }
        drop(sessions);

        if removed {
            debug!("Unregistered {} from {}", id, key);
        }
        removed
    }

    /// Signal cancellation to every task under `key` and forget the key.
    ///
    /// Returns how many tasks were signalled, 0 when the key is absent.
    pub fn cancel_all(&self, key: &DestinationKey) -> usize {
        let Some(tasks) = self.sessions.lock().remove(key) else {
            return 0;
        };

        for token in tasks.values() {
            token.cancel();
        }
        debug!("Cancelled {} tasks under {}", tasks.len(), key);
        tasks.len()
    }

    /// Cancel every task under every key. Used on shutdown.
    pub fn cancel_everything(&self) -> usize {
        let sessions = std::mem::take(&mut *self.sessions.lock());
        sessions
            .values()
            .flat_map(|tasks| tasks.values())
            .inspect(|token| token.cancel())
            .count()
    }

    /// Number of running tasks under `key`.
    pub fn active_tasks(&self, key: &DestinationKey) -> usize {
        self.sessions.lock().get(key).map_or(0, HashMap::len)
    }

    pub fn contains(&self, key: &DestinationKey) -> bool {
        self.sessions.lock().contains_key(key)
    }

    /// Number of destinations with at least one running task.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Snapshot of the destinations with running tasks.
    pub fn keys(&self) -> Vec<DestinationKey> {
        self.sessions.lock().keys().cloned().collect()
    }
}

/// A task's membership in the [`SessionRegistry`].
///
/// Dropping it unregisters the task, so removal runs on completion, on error,
/// on cancellation and when the owning future is aborted.
pub struct Registration {
    registry: Arc<SessionRegistry>,
    key: DestinationKey,
    id: TaskId,
    token: CancellationToken,
}

impl Registration {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn key(&self) -> &DestinationKey {
        &self.key
    }

    /// Token cancelled by [`SessionRegistry::cancel_all`].
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration").field("key", &self.key).field("id", &self.id).finish()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(&self.key, self.id);
    }
}
