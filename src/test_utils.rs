//! In-memory collaborators for unit tests.

use anyhow::{anyhow, Result};
use chrono::Utc;
use std::sync::{Arc, Mutex};

use crate::collaborators::{
    Notifier, SearchResult, Searcher, Summarizer, SystemLoad, SystemLoadReader,
};
use crate::commands::Assistant;
use crate::settings::Settings;
use crate::state::{StatePersistence, StateStore};
use crate::study::ActivityTracker;

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, text: &str) -> Result<()> {
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _text: &str) -> Result<()> {
        Err(anyhow!("transport down"))
    }
}

/// Rejects any message containing `needle` and records the rest.
pub struct FlakyNotifier {
    needle: String,
    delivered: RecordingNotifier,
}

impl FlakyNotifier {
    pub fn failing_on(needle: &str) -> Self {
        Self {
            needle: needle.to_string(),
            delivered: RecordingNotifier::default(),
        }
    }

    pub fn delivered(&self) -> Vec<String> {
        self.delivered.messages()
    }
}

impl Notifier for FlakyNotifier {
    fn notify(&self, text: &str) -> Result<()> {
        if text.contains(&self.needle) {
            return Err(anyhow!("rejected '{text}'"));
        }
        self.delivered.notify(text)
    }
}

pub struct StaticSearcher {
    results: Vec<SearchResult>,
}

impl StaticSearcher {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self { results }
    }
}

impl Searcher for StaticSearcher {
    fn search(&self, _query: &str, max_results: usize) -> Vec<SearchResult> {
        self.results.iter().take(max_results).cloned().collect()
    }
}

pub struct StaticSummarizer {
    reply: String,
}

impl StaticSummarizer {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
        }
    }
}

impl Summarizer for StaticSummarizer {
    fn summarize(&self, _prompt: &str, _system_prompt: &str) -> String {
        self.reply.clone()
    }
}

pub struct FixedLoadReader {
    available: bool,
    load: Option<SystemLoad>,
}

impl FixedLoadReader {
    pub fn new(load: Option<SystemLoad>) -> Self {
        Self {
            available: true,
            load,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            load: None,
        }
    }
}

impl SystemLoadReader for FixedLoadReader {
    fn is_available(&self) -> bool {
        self.available
    }

    fn read_system_load(&self) -> Option<SystemLoad> {
        self.load
    }
}

pub fn test_assistant(
    store: StateStore,
    settings: &Settings,
    notifier: Arc<RecordingNotifier>,
) -> Assistant {
    let now = Utc::now();
    Assistant {
        persistence: StatePersistence::new(store.clone(), settings.state_path.clone()),
        store,
        activity: ActivityTracker::new(now),
        notifier,
        searcher: Arc::new(StaticSearcher::new(Vec::new())),
        summarizer: Arc::new(StaticSummarizer::new("static summary")),
        load_reader: Arc::new(FixedLoadReader::new(None)),
        started_at: now,
    }
}
