use super::{SearchResult, Searcher, Summarizer};

/// Searcher used when no search provider is configured.
#[derive(Debug, Default, Clone)]
pub struct OfflineSearcher;

impl Searcher for OfflineSearcher {
    fn search(&self, query: &str, _max_results: usize) -> Vec<SearchResult> {
        log::debug!("search for '{query}' skipped: no provider configured");
        Vec::new()
    }
}

pub const UNAVAILABLE_REPLY: &str =
    "I'm here, but no language model is configured right now. Please check the provider setup.";

/// Summarizer used when no language model is configured.
#[derive(Debug, Default, Clone)]
pub struct EchoSummarizer;

impl Summarizer for EchoSummarizer {
    fn summarize(&self, _prompt: &str, _system_prompt: &str) -> String {
        UNAVAILABLE_REPLY.to_string()
    }
}
