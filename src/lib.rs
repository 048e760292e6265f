pub mod collaborators;
pub mod commands;
pub mod monitor;
pub mod reminders;
pub mod scheduler;
pub mod settings;
pub mod state;
pub mod study;
pub mod utils;

#[cfg(test)]
mod test_utils;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{error, info, warn};
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use collaborators::{EchoSummarizer, LogNotifier, OfflineSearcher, SysinfoLoadReader};
use commands::Assistant;
use scheduler::BackgroundScheduler;
use settings::Settings;
use state::{StatePersistence, StateStore};
use study::ActivityTracker;

pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("nanobot starting up...");

    let result = (|| -> Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to build tokio runtime")?;
        runtime.block_on(serve())
    })();

    if let Err(err) = result {
        error!("nanobot exited with error: {err:#}");
        std::process::exit(1);
    }
}

async fn serve() -> Result<()> {
    let data_dir = settings::data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
    let settings = Settings::load(&data_dir);

    let store = StateStore::default();
    let persistence = StatePersistence::new(store.clone(), settings.state_path.clone());
    let env_snapshot = std::env::var(&settings.env_snapshot_var).ok();
    persistence.load(env_snapshot.as_deref());

    let now = Utc::now();
    let assistant = Assistant {
        store,
        persistence,
        activity: ActivityTracker::new(now),
        notifier: Arc::new(LogNotifier),
        searcher: Arc::new(OfflineSearcher),
        summarizer: Arc::new(EchoSummarizer),
        load_reader: Arc::new(SysinfoLoadReader::new()),
        started_at: now,
    };

    let scheduler = BackgroundScheduler::start(&assistant, &settings)?;

    let startup = format!(
        "nanobot online. Knowledge: {} entries, topics: {}.",
        assistant.store.get(|s| s.knowledge.len()),
        assistant.store.get(|s| s.topics.len()),
    );
    if let Err(err) = assistant.notifier.notify(&startup) {
        warn!("Startup notification failed: {err:#}");
    }

    run_until_interrupted(console(&assistant), shutdown_signal()).await;

    scheduler.shutdown().await;
    assistant.persistence.save().await;
    info!("State saved to {}", assistant.persistence.path().display());
    Ok(())
}

/// Drive the console until `interrupt` resolves. Closing stdin only ends the
/// console; the background loops keep running until interrupted.
async fn run_until_interrupted<C, I>(console: C, interrupt: I)
where
    C: Future<Output = Result<()>>,
    I: Future<Output = ()>,
{
    tokio::pin!(interrupt);
    tokio::select! {
        result = console => {
            if let Err(err) = result {
                error!("Console stopped: {err:#}");
            }
            info!("Console closed; running headless until interrupted");
            interrupt.await;
        }
        _ = &mut interrupt => {}
    }
    info!("Interrupted, shutting down");
}

/// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C handler unavailable: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("SIGTERM handler unavailable: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Read commands and chat lines from stdin until EOF.
async fn console(assistant: &Assistant) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match commands::handle_line(assistant, &line, Utc::now()).await {
            Ok(reply) if reply.is_empty() => {}
            Ok(reply) => println!("{reply}"),
            Err(err) => println!("Error: {err:#}"),
        }
    }
    info!("stdin closed");
    Ok(())
}
