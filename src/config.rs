use crate::utils::{create_private_dir, get_data_dir, write_private_atomic};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE: &str = "config.json";

/// Lower and upper bound for [`AuditConfig::snapshot_retention`]
pub const RETENTION_BOUNDS: (usize, usize) = (1, 500);

/// Output format of CLI reports
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// User settings for the CLI. Engine constants are not configurable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditConfig {
    #[serde(default)]
    pub default_format: ReportFormat,
    /// Persist a report snapshot after every `analyze` run
    #[serde(default)]
    pub save_snapshots: bool,
    /// Snapshots kept per firewall; older ones are pruned after each save
    #[serde(default = "default_retention")]
    pub snapshot_retention: usize,
    /// Write diagnostics to `<state dir>/fwaudit.log` instead of stderr
    #[serde(default)]
    pub log_to_file: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            default_format: ReportFormat::Text,
            save_snapshots: false,
            snapshot_retention: default_retention(),
            log_to_file: false,
        }
    }
}

impl AuditConfig {
    /// Retention clamped to [`RETENTION_BOUNDS`]
    pub fn retention(&self) -> usize {
        self.snapshot_retention
            .clamp(RETENTION_BOUNDS.0, RETENTION_BOUNDS.1)
    }
}

fn default_retention() -> usize {
    20
}

/// Saves the config into `dir` using an atomic write with mode 0o600.
pub async fn save_config_to(dir: &Path, config: &AuditConfig) -> std::io::Result<()> {
    create_private_dir(dir)?;
    let json = serde_json::to_string_pretty(config)?;
    write_private_atomic(&dir.join(CONFIG_FILE), json.as_bytes()).await
}

/// Loads the config from `dir`, or returns the default if missing or unreadable.
pub async fn load_config_from(dir: &Path) -> AuditConfig {
    let path = dir.join(CONFIG_FILE);
    match tokio::fs::read_to_string(&path).await {
        Ok(json) => match serde_json::from_str::<AuditConfig>(&json) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                AuditConfig::default()
            }
        },
        Err(_) => AuditConfig::default(),
    }
}

/// Saves the config to the user data directory.
pub async fn save_config(config: &AuditConfig) -> std::io::Result<()> {
    match get_data_dir() {
        Some(dir) => save_config_to(&dir, config).await,
        None => Ok(()),
    }
}

/// Loads the config from the user data directory.
pub async fn load_config() -> AuditConfig {
    match get_data_dir() {
        Some(dir) => load_config_from(&dir).await,
        None => AuditConfig::default(),
    }
}
