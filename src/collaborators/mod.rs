//! Interfaces to the outside world used by the background loops.
//!
//! All methods are blocking; the loops call them from
//! `tokio::task::spawn_blocking` so a slow provider never stalls another
//! loop's timer.

mod notify;
mod offline;
mod system_load;

pub use notify::LogNotifier;
pub use offline::{EchoSummarizer, OfflineSearcher};
pub use system_load::{SysinfoLoadReader, SystemLoad};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Delivers a message to the assistant's single owner.
pub trait Notifier: Send + Sync {
    fn notify(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub body: String,
    pub url: String,
}

/// Web search. Implementations return an empty list on any failure.
pub trait Searcher: Send + Sync {
    fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult>;
}

/// Text generation. Implementations always produce text, falling back to a
/// placeholder apology when every provider fails.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, prompt: &str, system_prompt: &str) -> String;
}

/// Host metrics source.
pub trait SystemLoadReader: Send + Sync {
    /// Whether this host can report metrics at all.
    fn is_available(&self) -> bool;

    /// Current load, or `None` when no reading could be taken this time.
    fn read_system_load(&self) -> Option<SystemLoad>;
}
