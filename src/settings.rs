use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

pub const DATA_DIR_VAR: &str = "NANO_DATA_DIR";
pub const DEBUG_VAR: &str = "NANO_DEBUG";
pub const DEFAULT_ENV_SNAPSHOT_VAR: &str = "NANO_STATE_JSON";

/// Runtime configuration. Durations are stored as whole seconds on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub state_path: PathBuf,
    /// Environment variable holding an optional serialized state overlay.
    pub env_snapshot_var: String,
    #[serde(with = "secs")]
    pub reminder_poll: Duration,
    #[serde(with = "secs")]
    pub monitor_startup_delay: Duration,
    #[serde(with = "secs")]
    pub monitor_poll: Duration,
    #[serde(with = "secs")]
    pub study_startup_delay: Duration,
    #[serde(with = "secs")]
    pub study_poll: Duration,
    /// Foreground inactivity required before idle study may run.
    #[serde(with = "secs")]
    pub idle_threshold: Duration,
    /// Minimum spacing between two successful knowledge collections.
    #[serde(with = "secs")]
    pub collect_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("state.json"),
            env_snapshot_var: DEFAULT_ENV_SNAPSHOT_VAR.into(),
            reminder_poll: Duration::from_secs(30),
            monitor_startup_delay: Duration::from_secs(120),
            monitor_poll: Duration::from_secs(300),
            study_startup_delay: Duration::from_secs(90),
            study_poll: Duration::from_secs(60),
            idle_threshold: Duration::from_secs(20 * 60),
            collect_interval: Duration::from_secs(55 * 60),
        }
    }
}

impl Settings {
    /// Read `settings.json` from `data_dir` if present, then apply environment
    /// overrides. A missing or unreadable file falls back to defaults.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("settings.json");
        let mut settings = match Self::read_file(&path) {
            Ok(Some(settings)) => settings,
            Ok(None) => Self::default(),
            Err(err) => {
                warn!("Ignoring settings at {}: {err:#}", path.display());
                Self::default()
            }
        };

        if settings.state_path.is_relative() {
            settings.state_path = data_dir.join(&settings.state_path);
        }

        if debug_mode() {
            settings = settings.compressed();
        }

        settings
    }

    fn read_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))?;
        Ok(Some(settings))
    }

    /// Same shape with every cadence shrunk from minutes to seconds, for
    /// watching the loops fire by hand.
    fn compressed(self) -> Self {
        Self {
            reminder_poll: Duration::from_secs(5),
            monitor_startup_delay: Duration::from_secs(5),
            monitor_poll: Duration::from_secs(15),
            study_startup_delay: Duration::from_secs(5),
            study_poll: Duration::from_secs(10),
            idle_threshold: Duration::from_secs(20),
            collect_interval: Duration::from_secs(55),
            ..self
        }
    }
}

/// Directory holding `settings.json` and the state file.
pub fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn debug_mode() -> bool {
    std::env::var(DEBUG_VAR)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
