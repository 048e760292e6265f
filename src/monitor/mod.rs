mod cooldown;

pub use cooldown::CooldownTracker;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::collaborators::{Notifier, SystemLoad, SystemLoadReader};
use crate::scheduler::PeriodicTask;
use crate::state::StateStore;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

struct Threshold {
    condition: &'static str,
    label: &'static str,
    limit: f32,
    cooldown_minutes: i64,
    value: fn(&SystemLoad) -> f32,
}

const THRESHOLDS: [Threshold; 3] = [
    Threshold {
        condition: "cpu",
        label: "CPU",
        limit: 90.0,
        cooldown_minutes: 30,
        value: |load: &SystemLoad| load.cpu,
    },
    Threshold {
        condition: "mem",
        label: "RAM",
        limit: 90.0,
        cooldown_minutes: 30,
        value: |load: &SystemLoad| load.mem,
    },
    Threshold {
        condition: "disk",
        label: "Disk",
        limit: 95.0,
        cooldown_minutes: 60,
        value: |load: &SystemLoad| load.disk,
    },
];

/// Polls host metrics and alerts on sustained overload, at most once per
/// condition per cooldown window.
pub struct HealthMonitor {
    store: StateStore,
    reader: Arc<dyn SystemLoadReader>,
    notifier: Arc<dyn Notifier>,
    cooldowns: CooldownTracker,
}

impl HealthMonitor {
    pub fn new(
        store: StateStore,
        reader: Arc<dyn SystemLoadReader>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            reader,
            notifier,
            cooldowns: CooldownTracker::new(),
        }
    }

    /// Alert fragments for every exceeded threshold whose cooldown allows it.
    fn alerts_for(&mut self, load: &SystemLoad, now: DateTime<Utc>) -> Vec<String> {
        THRESHOLDS
            .iter()
            .filter_map(|t| {
                let value = (t.value)(load);
                if value <= t.limit {
                    return None;
                }
                if !self
                    .cooldowns
                    .should_fire(t.condition, now, Duration::minutes(t.cooldown_minutes))
                {
                    log_debug!("{} at {value:.1}% still cooling down", t.condition);
                    return None;
                }
                Some(format!("{} at {value:.1}%!", t.label))
            })
            .collect()
    }
}

impl PeriodicTask for HealthMonitor {
    fn name(&self) -> &'static str {
        "health-monitor"
    }

    async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.store.sysmon() || !self.reader.is_available() {
            return Ok(());
        }

        let reader = Arc::clone(&self.reader);
        let Some(load) = tokio::task::spawn_blocking(move || reader.read_system_load())
            .await
            .context("system load worker join failed")?
        else {
            log_debug!("no system load reading this cycle");
            return Ok(());
        };

        let alerts = self.alerts_for(&load, now);
        if alerts.is_empty() {
            return Ok(());
        }

        let message = alerts.join(" ");
        log_info!("health alert: {message}");
        let notifier = Arc::clone(&self.notifier);
        match tokio::task::spawn_blocking(move || notifier.notify(&message)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => log_warn!("health alert not delivered: {err:#}"),
            Err(err) => log_warn!("health alert worker failed: {err}"),
        }
        Ok(())
    }
}
