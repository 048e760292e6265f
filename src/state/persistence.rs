use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{error, info, warn};
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::collaborators::Notifier;

use super::model::{State, KNOWLEDGE_RETAINED};
use super::store::StateStore;

/// History turns written to disk.
pub const PERSISTED_HISTORY: usize = 8;
/// History turns and knowledge entries included in the remote backup.
pub const REMOTE_HISTORY: usize = 4;
pub const REMOTE_KNOWLEDGE: usize = 10;
/// Prefix marking a remote backup message.
pub const REMOTE_TAG: &str = "NANO_STATE:";

/// Writes the [`StateStore`] to a local JSON file and pushes trimmed backups
/// through a [`Notifier`].
#[derive(Clone)]
pub struct StatePersistence {
    store: StateStore,
    path: Arc<PathBuf>,
}

impl StatePersistence {
    pub fn new(store: StateStore, path: PathBuf) -> Self {
        Self {
            store,
            path: Arc::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Overlay the on-disk snapshot, then the environment-supplied one, onto
    /// the store's current (default) state. Each layer is a shallow per-field
    /// merge; a layer that is unreadable or does not fit the state shape is
    /// logged and skipped.
    pub fn load(&self, env_snapshot: Option<&str>) {
        let mut current = self.store.snapshot();

        match read_snapshot_file(self.path()) {
            Ok(Some(layer)) => match overlay(&current, layer) {
                Ok(merged) => {
                    current = merged;
                    info!(
                        "Loaded state from {} (knowledge={})",
                        self.path.display(),
                        current.knowledge.len()
                    );
                }
                Err(err) => warn!("Ignoring state file {}: {err:#}", self.path.display()),
            },
            Ok(None) => info!("No state file at {}; starting from defaults", self.path.display()),
            Err(err) => warn!("Ignoring state file {}: {err:#}", self.path.display()),
        }

        if let Some(raw) = env_snapshot.filter(|raw| !raw.trim().is_empty()) {
            match parse_layer(raw).and_then(|layer| overlay(&current, layer)) {
                Ok(merged) => {
                    current = merged;
                    info!("Applied state overlay from environment");
                }
                Err(err) => warn!("Ignoring environment state overlay: {err:#}"),
            }
        }

        self.store.replace(current);
    }

    /// Persist the current state, logging and swallowing any failure.
    pub async fn save(&self) {
        self.save_snapshot(self.store.snapshot()).await;
    }

    async fn save_snapshot(&self, state: State) {
        let path = Arc::clone(&self.path);
        match tokio::task::spawn_blocking(move || write_state(&path, &state)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!("Failed to save state to {}: {err:#}", self.path.display()),
            Err(err) => error!("State save worker failed: {err}"),
        }
    }

    /// Synchronous save that reports failure to the caller.
    pub fn try_save(&self) -> Result<()> {
        write_state(self.path(), &self.store.snapshot())
    }

    /// Save locally, then send a further-trimmed copy of the same snapshot as
    /// a tagged backup message. Failures are logged and swallowed.
    pub async fn remote_sync(&self, notifier: Arc<dyn Notifier>) {
        let state = self.store.snapshot();
        let body = remote_payload(&state);
        self.save_snapshot(state).await;

        let body = match body {
            Ok(body) => body,
            Err(err) => {
                error!("Failed to serialize remote backup: {err:#}");
                return;
            }
        };

        match tokio::task::spawn_blocking(move || notifier.notify(&body)).await {
            Ok(Ok(())) => {
                let at = Utc::now().format("%Y-%m-%d %H:%M UTC");
                info!("State backup pushed ({at})");
            }
            Ok(Err(err)) => warn!("State backup not delivered: {err:#}"),
            Err(err) => error!("State backup worker failed: {err}"),
        }
    }

    pub fn remote_payload(&self) -> Result<String> {
        remote_payload(&self.store.snapshot())
    }
}

fn remote_payload(state: &State) -> Result<String> {
    let data = state.truncated(REMOTE_HISTORY, REMOTE_KNOWLEDGE);
    Ok(format!("{REMOTE_TAG}{}", serde_json::to_string(&data)?))
}

/// Write the disk-trimmed `state` to a tmp file beside `path`, then rename it
/// into place.
fn write_state(path: &Path, state: &State) -> Result<()> {
    let data = state.truncated(PERSISTED_HISTORY, KNOWLEDGE_RETAINED);
    let serialized = serde_json::to_string_pretty(&data)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serialized)
        .with_context(|| format!("Failed to write state to {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move state into {}", path.display()))
}

fn read_snapshot_file(path: &Path) -> Result<Option<Map<String, Value>>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_layer(&contents).map(Some)
}

fn parse_layer(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw).context("snapshot is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("snapshot must be a JSON object, got {}", kind(&other))),
    }
}

/// Last-writer-wins merge of `layer`'s top-level fields over `base`.
fn overlay(base: &State, layer: Map<String, Value>) -> Result<State> {
    let mut merged = match serde_json::to_value(base)? {
        Value::Object(map) => map,
        _ => return Err(anyhow!("state did not serialize to an object")),
    };
    for (key, value) in layer {
        merged.insert(key, value);
    }
    let state: State = serde_json::from_value(Value::Object(merged))
        .context("snapshot does not match state shape")?;
    if state.briefing_hour > 23 {
        return Err(anyhow!("briefing_hour {} out of range", state.briefing_hour));
    }
    Ok(state)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
