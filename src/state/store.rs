use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::model::{KnowledgeEntry, Reminder, State};

/// Shared handle to the single in-process [`State`].
///
/// Every method takes the lock for exactly one logical operation and releases
/// it before returning, so callers can never hold it across an await point or
/// an external call. Compound mutations (insert + evict, partition reminders)
/// happen under one write guard, so [`StateStore::snapshot`] only ever sees
/// fully applied changes.
#[derive(Clone, Default)]
pub struct StateStore {
    inner: Arc<RwLock<State>>,
}

impl StateStore {
    pub fn new(state: State) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, State> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, State> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Deep copy of the entire state.
    pub fn snapshot(&self) -> State {
        self.read_guard().clone()
    }

    /// Read a projection of the state under the lock.
    pub fn get<T>(&self, f: impl FnOnce(&State) -> T) -> T {
        f(&self.read_guard())
    }

    /// Apply one atomic mutation and return whatever the closure yields.
    pub fn update<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        f(&mut self.write_guard())
    }

    /// Replace the whole state (boot-time overlay).
    pub fn replace(&self, state: State) {
        *self.write_guard() = state;
    }

    pub fn topics(&self) -> Vec<String> {
        self.get(|s| s.topics.clone())
    }

    pub fn autostudy(&self) -> bool {
        self.get(|s| s.autostudy)
    }

    pub fn sysmon(&self) -> bool {
        self.get(|s| s.sysmon)
    }

    pub fn briefing_hour(&self) -> u8 {
        self.get(|s| s.briefing_hour)
    }

    pub fn insert_knowledge(&self, key: String, entry: KnowledgeEntry) {
        self.update(|s| s.insert_knowledge(key, entry));
    }

    /// Remove and return every reminder due at `now`, leaving the rest in
    /// their original order.
    pub fn take_due_reminders(&self, now: DateTime<Utc>) -> Vec<Reminder> {
        self.update(|s| {
            if !s.reminders.iter().any(|r| r.is_due(now)) {
                return Vec::new();
            }
            let (due, remaining): (Vec<Reminder>, Vec<Reminder>) =
                std::mem::take(&mut s.reminders)
                    .into_iter()
                    .partition(|r| r.is_due(now));
            s.reminders = remaining;
            due
        })
    }
}
