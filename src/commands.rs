//! Foreground operations on the shared memory.
//!
//! The chat transport calls these; each one touches the store for its
//! in-memory step only and persists afterwards.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::collaborators::{Notifier, Searcher, Summarizer, SystemLoad, SystemLoadReader};
use crate::reminders::parse_delay;
use crate::state::{Reminder, Role, StatePersistence, StateStore};
use crate::study::{build_digest, ActivityTracker};
use crate::utils::truncate_chars;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

pub const CHAT_SYSTEM_PROMPT: &str = "You are a personal AI assistant: sharp, proactive and \
     concise. You help with automation, coding and research. Respond in plain conversational text.";

pub const SEARCH_SYSTEM_PROMPT: &str =
    "You are a research assistant. Summarise clearly and concisely.";

/// Results requested per `/search`, and how many of their links are listed.
const SEARCH_RESULTS: usize = 5;
const SEARCH_SOURCES: usize = 3;

pub const NO_RESULTS: &str = "No results found.";
pub const LOAD_UNAVAILABLE: &str = "System metrics are not available on this host.";

pub const HELP_TEXT: &str = "\
Commands
  <text>                     chat
  /clear                     reset chat history
  /status                    assistant and host status
  /sysinfo                   CPU / RAM / disk usage
  /search <query>            web search with a summary
  /digest [hours]            knowledge collected recently
  /topics [add|remove <t>]   manage study topics
  /autostudy [on|off]        idle-time study
  /sysmon [on|off]           host health alerts
  /briefing <hour>           daily briefing hour (UTC)
  /remind <30m|2h|1d> <msg>  schedule a reminder
  /sync                      save and push a backup
  /help                      this list";

/// Everything the foreground handler and the background loops share.
#[derive(Clone)]
pub struct Assistant {
    pub store: StateStore,
    pub persistence: StatePersistence,
    pub activity: ActivityTracker,
    pub notifier: Arc<dyn Notifier>,
    pub searcher: Arc<dyn Searcher>,
    pub summarizer: Arc<dyn Summarizer>,
    pub load_reader: Arc<dyn SystemLoadReader>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub uptime_secs: i64,
    pub knowledge: usize,
    pub topics: usize,
    pub pending_reminders: usize,
    pub autostudy: bool,
    pub sysmon: bool,
    pub briefing_hour: u8,
    pub load: Option<SystemLoad>,
}

impl StatusReport {
    pub fn render(&self) -> String {
        let on_off = |flag: bool| if flag { "on" } else { "off" };
        let mut lines = vec![
            format!("Uptime:     {}s", self.uptime_secs),
            format!("Knowledge:  {} entries", self.knowledge),
            format!("Topics:     {}", self.topics),
            format!("Reminders:  {} pending", self.pending_reminders),
            format!("Auto-study: {}", on_off(self.autostudy)),
            format!("Sysmon:     {}", on_off(self.sysmon)),
            format!("Briefing:   {:02}:00 UTC", self.briefing_hour),
        ];
        if let Some(load) = &self.load {
            lines.push(render_load(load));
        }
        lines.join("\n")
    }
}

pub fn render_load(load: &SystemLoad) -> String {
    format!("CPU: {:.1}%  RAM: {:.1}%  Disk: {:.1}%", load.cpu, load.mem, load.disk)
}

impl Assistant {
    pub fn touch_activity(&self, now: DateTime<Utc>) {
        self.activity.touch(now);
    }

    /// Answer a chat message with the conversation so far as context and
    /// remember both turns.
    pub async fn chat(&self, text: &str, now: DateTime<Utc>) -> Result<String> {
        self.touch_activity(now);
        let history = self.store.get(|s| {
            s.history
                .iter()
                .map(|h| format!("{:?}: {}", h.role, h.content))
                .collect::<Vec<_>>()
                .join("\n")
        });
        let prompt = if history.is_empty() {
            text.to_string()
        } else {
            format!("{history}\nUser: {text}")
        };

        let summarizer = Arc::clone(&self.summarizer);
        let reply =
            tokio::task::spawn_blocking(move || summarizer.summarize(&prompt, CHAT_SYSTEM_PROMPT))
                .await
                .context("chat worker join failed")?;
        self.record_exchange(text, &reply, now).await;
        Ok(reply)
    }

    pub async fn record_exchange(&self, user: &str, reply: &str, now: DateTime<Utc>) {
        self.touch_activity(now);
        self.store.update(|s| {
            s.push_history(Role::User, user);
            s.push_history(Role::Assistant, reply);
        });
        self.persistence.save().await;
    }

    pub async fn clear_history(&self) {
        self.store.update(|s| s.history.clear());
        self.persistence.save().await;
    }

    /// Schedule `msg` after `delay` (`30m`, `2h`, `1d`). Returns the due time.
    pub async fn add_reminder(
        &self,
        delay: &str,
        msg: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let msg = msg.trim();
        if msg.is_empty() {
            bail!("reminder message must not be empty");
        }
        let due = now + parse_delay(delay)?;
        self.store.update(|s| {
            s.reminders.push(Reminder {
                due,
                msg: msg.to_string(),
            })
        });
        self.persistence.save().await;
        Ok(due)
    }

    /// Returns `false` if the topic was already present.
    pub async fn add_topic(&self, topic: &str) -> bool {
        let topic = topic.trim().to_string();
        let added = self.store.update(|s| {
            if topic.is_empty() || s.topics.contains(&topic) {
                false
            } else {
                s.topics.push(topic);
                true
            }
        });
        if added {
            self.persistence.save().await;
        }
        added
    }

    /// Returns `false` if no such topic existed.
    pub async fn remove_topic(&self, topic: &str) -> bool {
        let topic = topic.trim();
        let removed = self.store.update(|s| {
            let before = s.topics.len();
            s.topics.retain(|t| t != topic);
            s.topics.len() != before
        });
        if removed {
            self.persistence.save().await;
        }
        removed
    }

    pub async fn set_autostudy(&self, on: bool) {
        self.store.update(|s| s.autostudy = on);
        self.persistence.save().await;
    }

    pub async fn set_sysmon(&self, on: bool) {
        self.store.update(|s| s.sysmon = on);
        self.persistence.save().await;
    }

    pub async fn set_briefing_hour(&self, hour: u8) -> Result<()> {
        if hour > 23 {
            bail!("briefing hour must be between 0 and 23, got {hour}");
        }
        self.store.update(|s| s.briefing_hour = hour);
        self.persistence.save().await;
        Ok(())
    }

    pub fn digest(&self, hours: i64, now: DateTime<Utc>) -> Result<String> {
        self.store.get(|s| build_digest(&s.knowledge, now, hours))
    }

    pub async fn status(&self, now: DateTime<Utc>) -> StatusReport {
        let load = self.system_load().await;
        self.store.get(|s| StatusReport {
            uptime_secs: (now - self.started_at).num_seconds(),
            knowledge: s.knowledge.len(),
            topics: s.topics.len(),
            pending_reminders: s.reminders.len(),
            autostudy: s.autostudy,
            sysmon: s.sysmon,
            briefing_hour: s.briefing_hour,
            load,
        })
    }

    /// Current host load, or `None` where the reader has nothing to report.
    pub async fn system_load(&self) -> Option<SystemLoad> {
        if !self.load_reader.is_available() {
            return None;
        }
        let reader = Arc::clone(&self.load_reader);
        match tokio::task::spawn_blocking(move || reader.read_system_load()).await {
            Ok(load) => load,
            Err(err) => {
                log_warn!("system load worker failed: {err}");
                None
            }
        }
    }

    /// Search the web for `query` and summarise the top results, followed by
    /// up to three source links.
    pub async fn search(&self, query: &str) -> Result<String> {
        let query = query.trim().to_string();
        if query.is_empty() {
            bail!("usage: /search <query>");
        }

        let searcher = Arc::clone(&self.searcher);
        let q = query.clone();
        let results = tokio::task::spawn_blocking(move || searcher.search(&q, SEARCH_RESULTS))
            .await
            .context("search worker join failed")?;
        if results.is_empty() {
            return Ok(NO_RESULTS.to_string());
        }

        let context = results
            .iter()
            .map(|r| format!("- {}: {}", r.title, truncate_chars(&r.body, 200)))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Summarise these search results for '{query}' in 3-4 concise points:\n{context}"
        );
        let summarizer = Arc::clone(&self.summarizer);
        let summary =
            tokio::task::spawn_blocking(move || summarizer.summarize(&prompt, SEARCH_SYSTEM_PROMPT))
                .await
                .context("summarize worker join failed")?;

        let sources = results
            .iter()
            .take(SEARCH_SOURCES)
            .filter(|r| !r.url.is_empty())
            .map(|r| format!("- {}", r.url))
            .collect::<Vec<_>>();
        if sources.is_empty() {
            return Ok(format!("{query}\n\n{summary}"));
        }
        Ok(format!("{query}\n\n{summary}\n\nSources:\n{}", sources.join("\n")))
    }

    pub async fn sync(&self) {
        self.persistence.remote_sync(Arc::clone(&self.notifier)).await;
    }
}

/// Parse `on|1|true` as enabled; anything else is disabled.
pub fn parse_toggle(arg: &str) -> bool {
    matches!(arg.trim().to_ascii_lowercase().as_str(), "on" | "1" | "true")
}

/// Dispatch one console line to the matching operation and return the reply.
pub async fn handle_line(assistant: &Assistant, line: &str, now: DateTime<Utc>) -> Result<String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(String::new());
    }
    if !line.starts_with('/') {
        return assistant.chat(line, now).await;
    }

    assistant.touch_activity(now);
    let mut parts = line.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let args = parts.next().unwrap_or_default().trim();

    let reply = match command {
        "/help" => HELP_TEXT.to_string(),
        "/status" => assistant.status(now).await.render(),
        "/sysinfo" => match assistant.system_load().await {
            Some(load) => render_load(&load),
            None => LOAD_UNAVAILABLE.to_string(),
        },
        "/search" => assistant.search(args).await?,
        "/clear" => {
            assistant.clear_history().await;
            "Chat history cleared.".to_string()
        }
        "/sync" => {
            assistant.sync().await;
            "Brain synced.".to_string()
        }
        "/digest" => {
            let hours = args.parse().unwrap_or(24);
            assistant.digest(hours, now)?
        }
        "/remind" => {
            let Some((delay, msg)) = args.split_once(char::is_whitespace) else {
                bail!("usage: /remind <Xm|Xh|Xd> <message>");
            };
            let due = assistant.add_reminder(delay, msg, now).await?;
            format!("Reminder set for {}: {}", due.format("%H:%M UTC"), msg.trim())
        }
        "/topics" => topics_command(assistant, args).await,
        "/autostudy" | "/sysmon" => {
            let is_study = command == "/autostudy";
            if args.is_empty() {
                let on = if is_study {
                    assistant.store.autostudy()
                } else {
                    assistant.store.sysmon()
                };
                format!("{}: {}", &command[1..], if on { "on" } else { "off" })
            } else {
                let on = parse_toggle(args);
                if is_study {
                    assistant.set_autostudy(on).await;
                } else {
                    assistant.set_sysmon(on).await;
                }
                format!("{} {}", &command[1..], if on { "enabled" } else { "disabled" })
            }
        }
        "/briefing" => {
            let hour: u8 = args
                .parse()
                .with_context(|| format!("invalid hour '{args}'"))?;
            assistant.set_briefing_hour(hour).await?;
            format!("Daily briefing at {hour:02}:00 UTC")
        }
        other => bail!("unknown command {other}"),
    };
    Ok(reply)
}

async fn topics_command(assistant: &Assistant, args: &str) -> String {
    let (action, topic) = args
        .split_once(char::is_whitespace)
        .map(|(a, t)| (a, t.trim()))
        .unwrap_or((args, ""));
    match (action, topic.is_empty()) {
        ("add", false) => {
            assistant.add_topic(topic).await;
            format!("Added: {topic}")
        }
        ("remove", false) => {
            assistant.remove_topic(topic).await;
            format!("Removed: {topic}")
        }
        _ => {
            let listing = assistant
                .store
                .topics()
                .iter()
                .map(|t| format!("- {t}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("Study topics:\n{listing}\n\n/topics add <topic>\n/topics remove <topic>")
        }
    }
}
