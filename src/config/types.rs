//! Configuration type definitions.

use std::path::PathBuf;

use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub discord: DiscordConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub research: ResearchConfig,
}

/// Discord bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub token: String,
    /// Command prefix, e.g. `!` for `!create stop`.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Bot owner, always allowed to run admin commands.
    pub owner_id: Option<u64>,
    /// Extra users allowed to run admin commands.
    #[serde(default)]
    pub admins: Vec<u64>,
}

/// Where maps, the task list and trades are stored.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Research map timing.
#[derive(Debug, Clone, Deserialize)]
pub struct ResearchConfig {
    /// Seconds between stale-stop sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Minutes before a shadow overlay expires.
    #[serde(default = "default_event_expiry")]
    pub event_expiry_minutes: i64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            event_expiry_minutes: default_event_expiry(),
        }
    }
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./storage")
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_event_expiry() -> i64 {
    crate::research::map::DEFAULT_OVERLAY_EXPIRY_MINUTES
}
