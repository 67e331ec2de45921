//! Audit trail of CLI operations
//!
//! Every analysis run and snapshot operation is appended to
//! `<state dir>/audit.log` as one JSON object per line.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Types of auditable events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    AnalyzeRulebase,
    SummarizeRulebases,
    SaveSnapshot,
    ShowSnapshot,
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred (UTC)
    pub timestamp: chrono::DateTime<chrono::Utc>,

    pub event_type: EventType,

    pub success: bool,

    /// Additional structured data about the event
    pub details: serde_json::Value,

    /// Error message if operation failed
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(
        event_type: EventType,
        success: bool,
        details: serde_json::Value,
        error: Option<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            event_type,
            success,
            details,
            error,
        }
    }

    /// One-line rendering for `fwaudit log`
    pub fn summary_line(&self) -> String {
        let status = if self.success { "ok" } else { "FAILED" };
        let mut line = format!(
            "{}  {:<20} {:<6} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.event_type,
            status,
            self.details
        );
        if let Some(error) = &self.error {
            line.push_str(&format!("  ({error})"));
        }
        line
    }
}

/// Audit log writer
pub struct AuditLog {
    log_path: PathBuf,
}

impl AuditLog {
    /// Opens the audit log in the user state directory
    ///
    /// # Errors
    ///
    /// Returns `Err` if state directory cannot be determined
    pub fn new() -> std::io::Result<Self> {
        let dir = crate::utils::get_state_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "State directory not found")
        })?;
        Ok(Self::in_dir(&dir))
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self {
            log_path: dir.join("audit.log"),
        }
    }

    /// Appends an event as one JSON line
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be opened or written
    pub async fn log(&self, event: AuditEvent) -> std::io::Result<()> {
        let json = serde_json::to_string(&event)?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;

        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.sync_all().await?;

        Ok(())
    }

    /// Reads up to `count` events, newest first. Unparseable lines are skipped
    /// and a missing log reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be read
    pub async fn read_recent(&self, count: usize) -> std::io::Result<Vec<AuditEvent>> {
        let content = match tokio::fs::read_to_string(&self.log_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let events: Vec<AuditEvent> = content
            .lines()
            .rev()
            .filter_map(|line| serde_json::from_str(line).ok())
            .take(count)
            .collect();

        Ok(events)
    }

    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }
}

/// Records an event in the default audit log. Failures are logged, not returned.
pub async fn record(
    event_type: EventType,
    success: bool,
    details: serde_json::Value,
    error: Option<String>,
) {
    if let Ok(audit) = AuditLog::new() {
        let event = AuditEvent::new(event_type, success, details, error);
        if let Err(e) = audit.log(event).await {
            tracing::warn!("Failed to write audit log: {}", e);
        }
    }
}

/// Logs an analysis run
///
/// # Arguments
///
/// * `firewall_id` - Firewall the rulebase belongs to
/// * `rule_count` - Number of rules analyzed
/// * `flagged_count` - Number of distinct rules in at least one category
/// * `error` - Error message if the analysis aborted
pub async fn log_analyze(
    firewall_id: i64,
    rule_count: usize,
    flagged_count: usize,
    error: Option<String>,
) {
    record(
        EventType::AnalyzeRulebase,
        error.is_none(),
        serde_json::json!({
            "firewall_id": firewall_id,
            "rule_count": rule_count,
            "flagged_count": flagged_count,
        }),
        error,
    )
    .await;
}

/// Logs a snapshot save together with how many old snapshots were pruned
pub async fn log_save_snapshot(
    firewall_id: i64,
    snapshot_id: uuid::Uuid,
    pruned: usize,
    error: Option<String>,
) {
    record(
        EventType::SaveSnapshot,
        error.is_none(),
        serde_json::json!({
            "firewall_id": firewall_id,
            "snapshot_id": snapshot_id,
            "pruned": pruned,
        }),
        error,
    )
    .await;
}
