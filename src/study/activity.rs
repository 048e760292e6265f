use chrono::{DateTime, Duration, Utc};
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

/// Time of the last foreground interaction, shared between the foreground
/// handler (writer) and the idle-study loop (reader). Not persisted: idle
/// detection restarts its clock on every boot.
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    last_ms: Arc<AtomicI64>,
}

impl ActivityTracker {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            last_ms: Arc::new(AtomicI64::new(now.timestamp_millis())),
        }
    }

    pub fn touch(&self, now: DateTime<Utc>) {
        self.last_ms.store(now.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_ms.load(Ordering::Relaxed))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_activity()
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}
