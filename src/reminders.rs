use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::collaborators::Notifier;
use crate::scheduler::PeriodicTask;
use crate::state::{StatePersistence, StateStore};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Parse a reminder delay of the form `<N>m`, `<N>h` or `<N>d`.
pub fn parse_delay(spec: &str) -> Result<Duration> {
    let spec = spec.trim().to_ascii_lowercase();
    let Some(unit) = spec.chars().last() else {
        bail!("empty reminder delay");
    };
    let amount: i64 = spec[..spec.len() - unit.len_utf8()]
        .parse()
        .with_context(|| format!("invalid reminder delay '{spec}' (use 30m, 2h or 1d)"))?;
    if amount < 0 {
        bail!("reminder delay must not be negative");
    }
    let delay = match unit {
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        other => bail!("unknown reminder unit '{other}' (use m, h or d)"),
    };
    delay.with_context(|| format!("reminder delay '{spec}' is too large"))
}

/// Delivers reminders once their due time has passed.
///
/// Due reminders are removed and persisted before any notification goes out,
/// so each reminder is delivered at most once.
pub struct ReminderLoop {
    store: StateStore,
    persistence: StatePersistence,
    notifier: Arc<dyn Notifier>,
}

impl ReminderLoop {
    pub fn new(
        store: StateStore,
        persistence: StatePersistence,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            persistence,
            notifier,
        }
    }
}

impl PeriodicTask for ReminderLoop {
    fn name(&self) -> &'static str {
        "reminders"
    }

    async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<()> {
        let due = self.store.take_due_reminders(now);
        if due.is_empty() {
            return Ok(());
        }

        self.persistence.save().await;
        log_info!("dispatching {} due reminder(s)", due.len());

        for reminder in due {
            let notifier = Arc::clone(&self.notifier);
            let text = format!("Reminder: {}", reminder.msg);
            match tokio::task::spawn_blocking(move || notifier.notify(&text)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => log_warn!("reminder '{}' not delivered: {err:#}", reminder.msg),
                Err(err) => log_warn!("reminder '{}' worker failed: {err}", reminder.msg),
            }
        }
        Ok(())
    }
}
