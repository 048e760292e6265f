//! Timed background loops.
//!
//! Each loop is a [`PeriodicTask`] driven by [`run_periodic`] on its own tokio
//! task. Cycles of one task never overlap: the next tick is only awaited once
//! the previous cycle has returned.

pub mod controller;

pub use controller::{BackgroundScheduler, TaskKind};

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::future::Future;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// One independently scheduled background activity.
pub trait PeriodicTask: Send + 'static {
    fn name(&self) -> &'static str;

    /// Run one cycle at wall-clock `now`. An `Err` is logged by the driver
    /// and the loop carries on with its next sleep.
    fn run_cycle(&mut self, now: DateTime<Utc>) -> impl Future<Output = Result<()>> + Send;
}

/// When a loop first wakes and how often after that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub startup_delay: Duration,
    pub period: Duration,
}

impl Cadence {
    pub fn new(startup_delay: Duration, period: Duration) -> Self {
        Self {
            startup_delay,
            period,
        }
    }
}

/// Sleep `startup_delay + period`, then run a cycle every `period` until
/// `cancel` fires. Cancellation also abandons an in-flight cycle.
pub async fn run_periodic<T: PeriodicTask>(
    mut task: T,
    cadence: Cadence,
    cancel: CancellationToken,
) {
    let period = cadence.period.max(Duration::from_millis(1));
    let first_tick = Instant::now() + cadence.startup_delay + period;
    let mut ticker = tokio::time::interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!(
        "{} loop started (startup delay {:?}, period {:?})",
        task.name(),
        cadence.startup_delay,
        period
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tokio::select! {
                    result = task.run_cycle(Utc::now()) => {
                        if let Err(err) = result {
                            log_error!("{} cycle failed: {err:#}", task.name());
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
            _ = cancel.cancelled() => break,
        }
    }

    log_info!("{} loop shutting down", task.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    struct Counting {
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    impl PeriodicTask for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run_cycle(&mut self, _now: DateTime<Utc>) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("boom"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn failing_cycles_keep_the_loop_alive() {
        let runs = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_periodic(
            Counting {
                runs: runs.clone(),
                fail: true,
            },
            Cadence::new(Duration::ZERO, Duration::from_millis(5)),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert!(runs.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn startup_delay_defers_first_cycle() {
        let runs = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_periodic(
            Counting {
                runs: runs.clone(),
                fail: false,
            },
            Cadence::new(Duration::from_secs(60), Duration::from_millis(5)),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop stops promptly")
            .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
