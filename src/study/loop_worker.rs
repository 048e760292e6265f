use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use rand::seq::SliceRandom;
use std::sync::Arc;

use crate::collaborators::{Notifier, Searcher, Summarizer};
use crate::scheduler::PeriodicTask;
use crate::state::{knowledge_key, KnowledgeEntry, StatePersistence, StateStore};
use crate::utils::truncate_chars;

use super::activity::ActivityTracker;
use super::digest::build_digest;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const SEARCH_RESULTS: usize = 4;
const SNIPPET_CHARS: usize = 150;
const BRIEFING_WINDOW_HOURS: i64 = 24;
/// Announce progress every time today's collection count reaches a multiple
/// of this.
const PROGRESS_EVERY: usize = 3;
const RESEARCH_SYSTEM_PROMPT: &str =
    "You are a research assistant. Give concise factual summaries.";

pub struct StudyCollaborators {
    pub searcher: Arc<dyn Searcher>,
    pub summarizer: Arc<dyn Summarizer>,
    pub notifier: Arc<dyn Notifier>,
}

/// Sends the daily briefing and, while the owner is away, researches one of
/// the configured topics per collection interval.
pub struct IdleStudyLoop {
    store: StateStore,
    persistence: StatePersistence,
    activity: ActivityTracker,
    collaborators: StudyCollaborators,
    idle_threshold: Duration,
    collect_interval: Duration,
    last_collect: Option<DateTime<Utc>>,
    last_briefing_day: Option<NaiveDate>,
}

impl IdleStudyLoop {
    pub fn new(
        store: StateStore,
        persistence: StatePersistence,
        activity: ActivityTracker,
        collaborators: StudyCollaborators,
        idle_threshold: std::time::Duration,
        collect_interval: std::time::Duration,
    ) -> Result<Self> {
        Ok(Self {
            store,
            persistence,
            activity,
            collaborators,
            idle_threshold: Duration::from_std(idle_threshold)
                .context("idle threshold out of range")?,
            collect_interval: Duration::from_std(collect_interval)
                .context("collect interval out of range")?,
            last_collect: None,
            last_briefing_day: None,
        })
    }

    pub fn last_collect(&self) -> Option<DateTime<Utc>> {
        self.last_collect
    }

    async fn notify(&self, text: String) -> Result<()> {
        let notifier = Arc::clone(&self.collaborators.notifier);
        tokio::task::spawn_blocking(move || notifier.notify(&text))
            .await
            .context("notify worker join failed")?
    }

    async fn maybe_send_briefing(&mut self, now: DateTime<Utc>) -> Result<()> {
        let today = now.date_naive();
        if now.hour() != u32::from(self.store.briefing_hour())
            || self.last_briefing_day == Some(today)
        {
            return Ok(());
        }
        self.last_briefing_day = Some(today);

        let digest = self
            .store
            .get(|s| build_digest(&s.knowledge, now, BRIEFING_WINDOW_HOURS))?;
        self.notify(format!("Good morning, here is your briefing\n\n{digest}"))
            .await?;
        log_info!("daily briefing sent for {today}");
        Ok(())
    }

    fn is_due_for_collection(&self, now: DateTime<Utc>) -> bool {
        if self.activity.idle_for(now) < self.idle_threshold {
            return false;
        }
        match self.last_collect {
            Some(last) => now - last >= self.collect_interval,
            None => true,
        }
    }

    async fn collect(&mut self, now: DateTime<Utc>) -> Result<()> {
        let topic = {
            let topics = self.store.topics();
            match topics.choose(&mut rand::thread_rng()) {
                Some(topic) => topic.clone(),
                None => return Ok(()),
            }
        };

        let searcher = Arc::clone(&self.collaborators.searcher);
        let query = topic.clone();
        let results = tokio::task::spawn_blocking(move || searcher.search(&query, SEARCH_RESULTS))
            .await
            .context("search worker join failed")?;
        if results.is_empty() {
            log_debug!("no search results for '{topic}'");
            return Ok(());
        }

        let context = results
            .iter()
            .map(|r| format!("- {}: {}", r.title, truncate_chars(&r.body, SNIPPET_CHARS)))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!("Summarise in 2-3 bullets about '{topic}':\n{context}");
        let summarizer = Arc::clone(&self.collaborators.summarizer);
        let summary = tokio::task::spawn_blocking(move || {
            summarizer.summarize(&prompt, RESEARCH_SYSTEM_PROMPT)
        })
        .await
        .context("summarize worker join failed")?;

        let today_count = self.store.update(|s| {
            s.insert_knowledge(
                knowledge_key(now),
                KnowledgeEntry {
                    topic: topic.clone(),
                    summary,
                },
            );
            s.knowledge_count_on(now)
        });
        self.persistence.save().await;
        self.last_collect = Some(now);
        log_info!("studied '{topic}' ({today_count} today)");

        if today_count > 0 && today_count % PROGRESS_EVERY == 0 {
            self.notify(format!(
                "Learned {today_count} things today.\nLatest: {topic}\n/digest to read."
            ))
            .await?;
        }
        Ok(())
    }
}

impl PeriodicTask for IdleStudyLoop {
    fn name(&self) -> &'static str {
        "idle-study"
    }

    async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<()> {
        if let Err(err) = self.maybe_send_briefing(now).await {
            log_warn!("daily briefing failed: {err:#}");
        }

        if !self.store.autostudy() || !self.is_due_for_collection(now) {
            return Ok(());
        }

        if let Err(err) = self.collect(now).await {
            log_error!("idle study failed: {err:#}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::SearchResult;
    use crate::state::{knowledge_key, State};
    use crate::study::digest::NOTHING_COLLECTED;
    use crate::test_utils::{FailingNotifier, RecordingNotifier, StaticSearcher, StaticSummarizer};
    use chrono::TimeZone;
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        store: StateStore,
        activity: ActivityTracker,
        notifier: Arc<RecordingNotifier>,
        study: IdleStudyLoop,
    }

    fn boot() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 1, 3, 0, 0).unwrap()
    }

    fn results() -> Vec<SearchResult> {
        vec![SearchResult {
            title: "Tokio 2.0".into(),
            body: "An async runtime".into(),
            url: "https://example.org/tokio".into(),
        }]
    }

    fn harness_with(searcher: StaticSearcher, notifier: Arc<RecordingNotifier>) -> Harness {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(State {
            topics: vec!["Rust programming".into()],
            ..State::default()
        });
        let persistence = StatePersistence::new(store.clone(), dir.path().join("state.json"));
        let activity = ActivityTracker::new(boot());
        let study = IdleStudyLoop::new(
            store.clone(),
            persistence,
            activity.clone(),
            StudyCollaborators {
                searcher: Arc::new(searcher),
                summarizer: Arc::new(StaticSummarizer::new("- bullet")),
                notifier: notifier.clone(),
            },
            std::time::Duration::from_secs(20 * 60),
            std::time::Duration::from_secs(55 * 60),
        )
        .unwrap();
        Harness {
            _dir: dir,
            store,
            activity,
            notifier,
            study,
        }
    }

    fn harness() -> Harness {
        harness_with(
            StaticSearcher::new(results()),
            Arc::new(RecordingNotifier::default()),
        )
    }

    #[tokio::test]
    async fn autostudy_off_never_collects() {
        let mut h = harness();
        h.store.update(|s| s.autostudy = false);

        for hours in 1..5 {
            h.study.run_cycle(boot() + Duration::hours(hours)).await.unwrap();
        }
        assert!(h.store.get(|s| s.knowledge.is_empty()));
        assert!(h.study.last_collect().is_none());
    }

    #[tokio::test]
    async fn requires_idle_owner() {
        let mut h = harness();
        let now = boot() + Duration::minutes(30);
        h.activity.touch(now - Duration::minutes(19));

        h.study.run_cycle(now).await.unwrap();
        assert!(h.store.get(|s| s.knowledge.is_empty()));

        h.study.run_cycle(now + Duration::minutes(1)).await.unwrap();
        assert_eq!(h.store.get(|s| s.knowledge.len()), 1);
    }

    #[tokio::test]
    async fn collects_once_per_interval() {
        let mut h = harness();
        let first = boot() + Duration::minutes(21);

        h.study.run_cycle(first).await.unwrap();
        h.study.run_cycle(first + Duration::minutes(1)).await.unwrap();
        h.study.run_cycle(first + Duration::minutes(54)).await.unwrap();
        assert_eq!(h.store.get(|s| s.knowledge.len()), 1);
        assert_eq!(h.study.last_collect(), Some(first));

        h.study.run_cycle(first + Duration::minutes(55)).await.unwrap();
        assert_eq!(h.store.get(|s| s.knowledge.len()), 2);

        let entry = h
            .store
            .get(|s| s.knowledge.get(&knowledge_key(first)).cloned())
            .unwrap();
        assert_eq!(entry.topic, "Rust programming");
        assert_eq!(entry.summary, "- bullet");
    }

    #[tokio::test]
    async fn empty_search_does_not_advance_timer() {
        let mut h = harness_with(
            StaticSearcher::new(Vec::new()),
            Arc::new(RecordingNotifier::default()),
        );
        h.study.run_cycle(boot() + Duration::minutes(30)).await.unwrap();
        assert!(h.study.last_collect().is_none());
        assert!(h.store.get(|s| s.knowledge.is_empty()));
    }

    #[tokio::test]
    async fn empty_topic_list_is_a_quiet_skip() {
        let mut h = harness();
        h.store.update(|s| s.topics.clear());
        h.study.run_cycle(boot() + Duration::minutes(30)).await.unwrap();
        assert!(h.study.last_collect().is_none());
    }

    #[tokio::test]
    async fn progress_note_every_third_entry_today() {
        let mut h = harness();
        let start = boot() + Duration::minutes(30);
        for i in 0..3 {
            h.study.run_cycle(start + Duration::hours(i)).await.unwrap();
        }
        let sent = h.notifier.messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("Learned 3 things today."));
    }

    #[tokio::test]
    async fn failed_progress_note_still_records_collection() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::default();
        let now = boot() + Duration::minutes(30);
        store.update(|s| {
            s.topics = vec!["Rust programming".into()];
            for minutes in [10, 20] {
                s.insert_knowledge(
                    knowledge_key(now - Duration::minutes(minutes)),
                    KnowledgeEntry {
                        topic: "earlier".into(),
                        summary: "s".into(),
                    },
                );
            }
        });
        let persistence = StatePersistence::new(store.clone(), dir.path().join("state.json"));
        let mut study = IdleStudyLoop::new(
            store.clone(),
            persistence,
            ActivityTracker::new(boot()),
            StudyCollaborators {
                searcher: Arc::new(StaticSearcher::new(results())),
                summarizer: Arc::new(StaticSummarizer::new("ok")),
                notifier: Arc::new(FailingNotifier),
            },
            std::time::Duration::from_secs(20 * 60),
            std::time::Duration::from_secs(55 * 60),
        )
        .unwrap();

        study.run_cycle(now).await.unwrap();

        assert_eq!(study.last_collect(), Some(now));
        assert_eq!(store.get(|s| s.knowledge.len()), 3);
        assert!(dir.path().join("state.json").exists());
    }

    #[tokio::test]
    async fn briefing_fires_once_per_day_at_configured_hour() {
        let mut h = harness();
        h.store.update(|s| {
            s.briefing_hour = 9;
            s.autostudy = false;
        });
        let nine = Utc.with_ymd_and_hms(2024, 10, 1, 9, 0, 0).unwrap();

        h.study.run_cycle(nine - Duration::minutes(1)).await.unwrap();
        assert!(h.notifier.messages().is_empty());

        h.study.run_cycle(nine).await.unwrap();
        h.study.run_cycle(nine + Duration::minutes(1)).await.unwrap();
        h.study.run_cycle(nine + Duration::minutes(59)).await.unwrap();
        let sent = h.notifier.messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].ends_with(NOTHING_COLLECTED));

        h.study.run_cycle(nine + Duration::days(1)).await.unwrap();
        assert_eq!(h.notifier.messages().len(), 2);
    }

    #[tokio::test]
    async fn briefing_failure_does_not_block_study() {
        let mut h = harness();
        let nine = Utc.with_ymd_and_hms(2024, 10, 1, 9, 0, 0).unwrap();
        h.store.update(|s| {
            s.knowledge.insert(
                "garbage-key".into(),
                KnowledgeEntry {
                    topic: "t".into(),
                    summary: "s".into(),
                },
            );
        });

        h.study.run_cycle(nine).await.unwrap();

        assert!(h.notifier.messages().is_empty());
        assert_eq!(h.study.last_collect(), Some(nine));
    }
}
