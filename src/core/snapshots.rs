//! File-backed store of report snapshots
//!
//! Each snapshot is written once and never modified. Layout under the store
//! root:
//!
//! ```text
//! <root>/<firewall_id>/<captured_at_millis>_<uuid>.json
//! <root>/<firewall_id>/<captured_at_millis>_<uuid>.json.sha256
//! ```
//!
//! The sidecar holds the hex SHA-256 of the JSON file. A snapshot whose
//! content no longer matches its sidecar is refused on load.

use crate::core::error::{Result, SnapshotError};
use crate::core::report::ReportSnapshot;
use crate::utils::{create_private_dir, get_data_dir, write_private_atomic};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Metadata of a stored snapshot, parsed from its file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub id: Uuid,
    pub firewall_id: i64,
    pub captured_at: DateTime<Utc>,
    pub path: PathBuf,
}

pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store under `<data dir>/reports`
    pub fn open_default() -> Result<Self> {
        let data_dir = get_data_dir().ok_or(SnapshotError::DataDirUnavailable)?;
        Ok(Self::new(data_dir.join("reports")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn firewall_dir(&self, firewall_id: i64) -> PathBuf {
        self.root.join(firewall_id.to_string())
    }

    /// Persists a snapshot and its checksum sidecar.
    pub async fn save(&self, snapshot: &ReportSnapshot) -> Result<PathBuf> {
        let dir = self.firewall_dir(snapshot.firewall_id);
        create_private_dir(&dir)?;

        let path = dir.join(file_name(snapshot.captured_at, snapshot.id));
        let json = serde_json::to_string_pretty(snapshot)?;
        write_private_atomic(&path, json.as_bytes()).await?;
        write_private_atomic(&checksum_path(&path), checksum(json.as_bytes()).as_bytes()).await?;

        info!(
            "Saved report snapshot {} for firewall {} to {}",
            snapshot.id,
            snapshot.firewall_id,
            path.display()
        );
        Ok(path)
    }

    /// Loads a snapshot by id from any firewall directory.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::NotFound`] if no stored snapshot has this id
    /// - [`SnapshotError::ChecksumMismatch`] if the file was altered
    pub async fn load(&self, id: Uuid) -> Result<ReportSnapshot> {
        let entry = self
            .all_entries()
            .await?
            .into_iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| SnapshotError::NotFound(id.to_string()))?;
        read_verified(&entry.path).await
    }

    /// Snapshots of one firewall, newest first
    pub async fn history(&self, firewall_id: i64) -> Result<Vec<SnapshotEntry>> {
        let mut entries = entries_in(&self.firewall_dir(firewall_id), firewall_id).await?;
        entries.sort_by(|a, b| b.captured_at.cmp(&a.captured_at).then(b.id.cmp(&a.id)));
        Ok(entries)
    }

    /// Most recent snapshot of one firewall, if any
    pub async fn latest(&self, firewall_id: i64) -> Result<Option<ReportSnapshot>> {
        match self.history(firewall_id).await?.first() {
            Some(entry) => read_verified(&entry.path).await.map(Some),
            None => Ok(None),
        }
    }

    /// Deletes all but the `keep` newest snapshots of one firewall.
    ///
    /// Returns the number of snapshots removed.
    pub async fn prune(&self, firewall_id: i64, keep: usize) -> Result<usize> {
        let history = self.history(firewall_id).await?;
        let mut removed = 0;

        for entry in history.iter().skip(keep) {
            if let Err(e) = tokio::fs::remove_file(&entry.path).await {
                warn!("Failed to remove old snapshot {}: {}", entry.path.display(), e);
                continue;
            }
            let _ = tokio::fs::remove_file(checksum_path(&entry.path)).await;
            debug!("Removed old snapshot {}", entry.path.display());
            removed += 1;
        }

        if removed > 0 {
            info!("Pruned {removed} snapshot(s) of firewall {firewall_id}");
        }
        Ok(removed)
    }

    async fn all_entries(&self) -> Result<Vec<SnapshotEntry>> {
        let mut entries = Vec::new();
        let mut dirs = match tokio::fs::read_dir(&self.root).await {
            Ok(dirs) => dirs,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };

        while let Some(dir) = dirs.next_entry().await? {
            let Some(firewall_id) = dir.file_name().to_str().and_then(|n| n.parse::<i64>().ok())
            else {
                continue;
            };
            entries.extend(entries_in(&dir.path(), firewall_id).await?);
        }
        Ok(entries)
    }
}

fn file_name(captured_at: DateTime<Utc>, id: Uuid) -> String {
    format!("{:013}_{}.json", captured_at.timestamp_millis().max(0), id)
}

fn parse_file_name(name: &str) -> Option<(DateTime<Utc>, Uuid)> {
    let stem = name.strip_suffix(".json")?;
    let (millis, id) = stem.split_once('_')?;
    let captured_at = DateTime::<Utc>::from_timestamp_millis(millis.parse().ok()?)?;
    Some((captured_at, Uuid::parse_str(id).ok()?))
}

fn checksum_path(path: &Path) -> PathBuf {
    path.with_extension("json.sha256")
}

fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

async fn entries_in(dir: &Path, firewall_id: i64) -> Result<Vec<SnapshotEntry>> {
    let mut entries = Vec::new();
    let mut files = match tokio::fs::read_dir(dir).await {
        Ok(files) => files,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
        Err(e) => return Err(e.into()),
    };

    while let Some(file) = files.next_entry().await? {
        let name = file.file_name();
        let Some((captured_at, id)) = name.to_str().and_then(parse_file_name) else {
            continue;
        };
        entries.push(SnapshotEntry {
            id,
            firewall_id,
            captured_at,
            path: file.path(),
        });
    }
    Ok(entries)
}

async fn read_verified(path: &Path) -> Result<ReportSnapshot> {
    let bytes = tokio::fs::read(path).await?;

    match tokio::fs::read_to_string(checksum_path(path)).await {
        Ok(expected) => {
            let actual = checksum(&bytes);
            if expected.trim() != actual {
                return Err(SnapshotError::ChecksumMismatch {
                    expected: expected.trim().to_string(),
                    actual,
                }
                .into());
            }
        }
        Err(e) => warn!("Snapshot {} has no readable checksum: {}", path.display(), e),
    }

    let mut snapshot: ReportSnapshot = serde_json::from_slice(&bytes)?;
    snapshot.types = snapshot.types.backfill();
    Ok(snapshot)
}
