use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Knowledge entries kept in memory before eviction kicks in.
pub const KNOWLEDGE_CAPACITY: usize = 40;
/// Entries that survive an eviction (and the cap applied on save).
pub const KNOWLEDGE_RETAINED: usize = 30;
/// Conversation turns kept in memory.
pub const HISTORY_CAPACITY: usize = 12;

const KNOWLEDGE_KEY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeEntry {
    pub topic: String,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reminder {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub due: DateTime<Utc>,
    pub msg: String,
}

impl Reminder {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due <= now
    }
}

/// The whole of the assistant's durable memory.
///
/// `knowledge` is keyed by collection timestamp (see [`knowledge_key`]); the
/// fixed-width key format makes `BTreeMap` order chronological.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct State {
    pub topics: Vec<String>,
    pub knowledge: BTreeMap<String, KnowledgeEntry>,
    pub history: Vec<HistoryEntry>,
    pub reminders: Vec<Reminder>,
    pub autostudy: bool,
    pub sysmon: bool,
    pub briefing_hour: u8,
}

impl Default for State {
    fn default() -> Self {
        Self {
            topics: [
                "AI and LLM developments",
                "Python automation tips",
                "Cybersecurity news",
                "Windows 11 productivity",
                "Telegram bot development",
                "Business automation tools",
                "Rust programming",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            knowledge: BTreeMap::new(),
            history: Vec::new(),
            reminders: Vec::new(),
            autostudy: true,
            sysmon: true,
            briefing_hour: 9,
        }
    }
}

impl State {
    /// Insert a knowledge entry, then evict down to the newest
    /// [`KNOWLEDGE_RETAINED`] if the map grew past [`KNOWLEDGE_CAPACITY`].
    pub fn insert_knowledge(&mut self, key: String, entry: KnowledgeEntry) {
        self.knowledge.insert(key, entry);
        if self.knowledge.len() > KNOWLEDGE_CAPACITY {
            retain_latest(&mut self.knowledge, KNOWLEDGE_RETAINED);
        }
    }

    /// Append a turn, keeping the newest [`HISTORY_CAPACITY`].
    pub fn push_history(&mut self, role: Role, content: impl Into<String>) {
        self.history.push(HistoryEntry {
            role,
            content: content.into(),
        });
        truncate_front(&mut self.history, HISTORY_CAPACITY);
    }

    /// Copy with history and knowledge cut to the newest `history` / `knowledge`
    /// entries. Used for the on-disk and remote backups.
    pub fn truncated(&self, history: usize, knowledge: usize) -> State {
        let mut copy = self.clone();
        truncate_front(&mut copy.history, history);
        retain_latest(&mut copy.knowledge, knowledge);
        copy
    }

    /// Number of knowledge entries collected on the UTC calendar day of `now`.
    pub fn knowledge_count_on(&self, now: DateTime<Utc>) -> usize {
        let prefix = now.format("%Y-%m-%d").to_string();
        self.knowledge.keys().filter(|k| k.starts_with(&prefix)).count()
    }
}

/// Key under which a knowledge entry collected at `at` is stored.
pub fn knowledge_key(at: DateTime<Utc>) -> String {
    at.format(KNOWLEDGE_KEY_FORMAT).to_string()
}

/// Inverse of [`knowledge_key`]; also accepts RFC 3339 keys.
pub fn parse_knowledge_key(key: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(key).map_err(|err| anyhow!("malformed knowledge key '{key}': {err}"))
}

/// ISO-8601 timestamp, either offset-less (read as UTC) or RFC 3339.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

fn retain_latest<V>(map: &mut BTreeMap<String, V>, keep: usize) {
    while map.len() > keep {
        if map.pop_first().is_none() {
            break;
        }
    }
}

fn truncate_front<T>(items: &mut Vec<T>, keep: usize) {
    if items.len() > keep {
        items.drain(..items.len() - keep);
    }
}
