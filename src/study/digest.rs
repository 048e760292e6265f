use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

use crate::state::{parse_knowledge_key, KnowledgeEntry};
use crate::utils::truncate_chars;

/// Upper bound on a rendered digest, in characters.
pub const MAX_DIGEST_CHARS: usize = 3800;

pub const NOTHING_COLLECTED: &str = "No knowledge collected yet.";

pub fn nothing_in_window(hours: i64) -> String {
    format!("Nothing collected in last {hours}h.")
}

/// Render the knowledge entries collected in the `hours` before `now`,
/// oldest first. A key that is not a timestamp is reported as an error.
pub fn build_digest(
    knowledge: &BTreeMap<String, KnowledgeEntry>,
    now: DateTime<Utc>,
    hours: i64,
) -> Result<String> {
    if knowledge.is_empty() {
        return Ok(NOTHING_COLLECTED.to_string());
    }

    let cutoff = Duration::try_hours(hours)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut recent = Vec::new();
    for (key, entry) in knowledge {
        let at = parse_knowledge_key(key)?;
        if at >= cutoff {
            recent.push((at, entry));
        }
    }
    if recent.is_empty() {
        return Ok(nothing_in_window(hours));
    }

    let mut lines = vec![format!("{} entries (last {hours}h)\n", recent.len())];
    for (at, entry) in &recent {
        lines.push(format!(
            "[{}] *{}*\n{}\n",
            at.format("%H:%M"),
            entry.topic,
            entry.summary
        ));
    }
    let rendered = lines.join("\n");
    Ok(truncate_chars(&rendered, MAX_DIGEST_CHARS).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::knowledge_key;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 10, 9, 0, 0).unwrap()
    }

    fn entry(topic: &str, summary: &str) -> KnowledgeEntry {
        KnowledgeEntry {
            topic: topic.into(),
            summary: summary.into(),
        }
    }

    #[test]
    fn empty_knowledge_has_fixed_message() {
        let digest = build_digest(&BTreeMap::new(), now(), 24).unwrap();
        assert_eq!(digest, NOTHING_COLLECTED);
    }

    #[test]
    fn stale_knowledge_has_window_message() {
        let mut kb = BTreeMap::new();
        kb.insert(knowledge_key(now() - Duration::hours(30)), entry("old", "news"));
        let digest = build_digest(&kb, now(), 24).unwrap();
        assert_eq!(digest, nothing_in_window(24));
    }

    #[test]
    fn renders_recent_entries_in_order() {
        let mut kb = BTreeMap::new();
        kb.insert(knowledge_key(now() - Duration::hours(2)), entry("tokio", "runtime"));
        kb.insert(knowledge_key(now() - Duration::hours(5)), entry("serde", "derive"));
        kb.insert(knowledge_key(now() - Duration::hours(48)), entry("ancient", "skip me"));

        let digest = build_digest(&kb, now(), 24).unwrap();
        assert!(digest.starts_with("2 entries (last 24h)"));
        let serde_at = digest.find("[04:00] *serde*").unwrap();
        let tokio_at = digest.find("[07:00] *tokio*").unwrap();
        assert!(serde_at < tokio_at);
        assert!(!digest.contains("ancient"));
    }

    #[test]
    fn long_digest_is_capped() {
        let mut kb = BTreeMap::new();
        for i in 0..30 {
            kb.insert(
                knowledge_key(now() - Duration::minutes(i)),
                entry("bulk", &"x".repeat(500)),
            );
        }
        let digest = build_digest(&kb, now(), 24).unwrap();
        assert_eq!(digest.chars().count(), MAX_DIGEST_CHARS);
    }

    #[test]
    fn malformed_key_is_an_error() {
        let mut kb = BTreeMap::new();
        kb.insert("not-a-time".to_string(), entry("x", "y"));
        assert!(build_digest(&kb, now(), 24).is_err());
    }
}
