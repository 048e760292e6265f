use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Remembers when each named alert condition last fired.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    last_fired: HashMap<String, DateTime<Utc>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` and records `now` if `condition` has never fired or last
    /// fired at least `min_interval` ago. Otherwise leaves the record alone.
    pub fn should_fire(
        &mut self,
        condition: &str,
        now: DateTime<Utc>,
        min_interval: Duration,
    ) -> bool {
        if let Some(last) = self.last_fired.get(condition) {
            if now - *last < min_interval {
                return false;
            }
        }
        self.last_fired.insert(condition.to_string(), now);
        true
    }

    pub fn last_fired(&self, condition: &str) -> Option<DateTime<Utc>> {
        self.last_fired.get(condition).copied()
    }
}
