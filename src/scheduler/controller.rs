use anyhow::Result;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::commands::Assistant;
use crate::monitor::HealthMonitor;
use crate::reminders::ReminderLoop;
use crate::settings::Settings;
use crate::study::{IdleStudyLoop, StudyCollaborators};

use super::{run_periodic, Cadence, PeriodicTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Reminders,
    HealthMonitor,
    IdleStudy,
}

struct ScheduledTask {
    kind: TaskKind,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Owns the background loops for the lifetime of the process.
///
/// Every loop gets a child token of one root token, so a single loop can be
/// stopped on its own and [`BackgroundScheduler::shutdown`] stops them all.
pub struct BackgroundScheduler {
    root: CancellationToken,
    tasks: Vec<ScheduledTask>,
}

impl BackgroundScheduler {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Spawn the reminder, health-monitor and idle-study loops.
    pub fn start(assistant: &Assistant, settings: &Settings) -> Result<Self> {
        let mut scheduler = Self::new();

        scheduler.spawn(
            TaskKind::Reminders,
            ReminderLoop::new(
                assistant.store.clone(),
                assistant.persistence.clone(),
                Arc::clone(&assistant.notifier),
            ),
            Cadence::new(std::time::Duration::ZERO, settings.reminder_poll),
        );

        scheduler.spawn(
            TaskKind::HealthMonitor,
            HealthMonitor::new(
                assistant.store.clone(),
                Arc::clone(&assistant.load_reader),
                Arc::clone(&assistant.notifier),
            ),
            Cadence::new(settings.monitor_startup_delay, settings.monitor_poll),
        );

        let study = IdleStudyLoop::new(
            assistant.store.clone(),
            assistant.persistence.clone(),
            assistant.activity.clone(),
            StudyCollaborators {
                searcher: Arc::clone(&assistant.searcher),
                summarizer: Arc::clone(&assistant.summarizer),
                notifier: Arc::clone(&assistant.notifier),
            },
            settings.idle_threshold,
            settings.collect_interval,
        )?;
        scheduler.spawn(
            TaskKind::IdleStudy,
            study,
            Cadence::new(settings.study_startup_delay, settings.study_poll),
        );

        info!("Background scheduler started {} loops", scheduler.tasks.len());
        Ok(scheduler)
    }

    pub fn spawn<T: PeriodicTask>(&mut self, kind: TaskKind, task: T, cadence: Cadence) {
        if self.tasks.iter().any(|t| t.kind == kind && t.handle.is_some()) {
            warn!("{kind:?} loop already running; ignoring second spawn");
            return;
        }

        let cancel_token = self.root.child_token();
        let handle = tokio::spawn(run_periodic(task, cadence, cancel_token.clone()));
        self.tasks.push(ScheduledTask {
            kind,
            cancel_token,
            handle: Some(handle),
        });
    }

    pub fn is_running(&self, kind: TaskKind) -> bool {
        self.tasks.iter().any(|t| {
            t.kind == kind && t.handle.as_ref().is_some_and(|handle| !handle.is_finished())
        })
    }

    /// Stop one loop and wait for it to exit.
    pub async fn cancel(&mut self, kind: TaskKind) {
        for task in self.tasks.iter_mut().filter(|t| t.kind == kind) {
            task.cancel_token.cancel();
            join_task(task).await;
        }
    }

    /// Stop every loop and wait for all of them. In-flight cycles are
    /// abandoned.
    pub async fn shutdown(mut self) {
        self.root.cancel();
        for task in self.tasks.iter_mut() {
            join_task(task).await;
        }
        info!("Background scheduler stopped");
    }
}

impl Default for BackgroundScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn join_task(task: &mut ScheduledTask) {
    if let Some(handle) = task.handle.take() {
        if let Err(err) = handle.await {
            error!("{:?} loop ended abnormally: {err}", task.kind);
        }
    }
}
