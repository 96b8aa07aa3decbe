use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sitesnap_crawler::SnapshotDir;
use sitesnap_crawler::storage::write_text;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::record::{JobRecord, SiteSummary};

pub const INDEX_FILE: &str = "index.json";

/// On-disk snapshot tree: `<root>/<host>/index.json` plus one directory per
/// run under `<root>/<host>/<ts>/`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn host_dir(&self, host: &str) -> Result<PathBuf> {
        check_component("host", host)?;
        Ok(self.root.join(host))
    }

    pub fn snapshot_dir(&self, host: &str, ts: &str) -> Result<PathBuf> {
        check_component("timestamp", ts)?;
        Ok(self.host_dir(host)?.join(ts))
    }

    /// Create `original/` and `local/` for a run. Idempotent.
    pub async fn ensure_directories(&self, host: &str, ts: &str) -> Result<SnapshotDir> {
        let dir = self.snapshot_dir(host, ts)?;
        Ok(SnapshotDir::ensure(dir).await?)
    }

    /// Run history of `host`, newest first. Empty when nothing is archived.
    pub async fn load_index(&self, host: &str) -> Result<Vec<JobRecord>> {
        let path = self.host_dir(host)?.join(INDEX_FILE);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the run history of `host`.
    pub async fn save_index(&self, host: &str, records: &[JobRecord]) -> Result<()> {
        let path = self.host_dir(host)?.join(INDEX_FILE);
        write_text(&path, &serde_json::to_string_pretty(records)?).await?;
        Ok(())
    }

    /// Put `record` at the head of its host's history.
    pub async fn prepend_record(&self, record: JobRecord) -> Result<()> {
        let mut records = self.load_index(&record.host).await?;
        let host = record.host.clone();
        records.insert(0, record);
        self.save_index(&host, &records).await
    }

    /// Remove one run and its index entry. The host directory goes too once
    /// nothing is left in it.
    pub async fn delete_snapshot(&self, host: &str, ts: &str) -> Result<()> {
        let dir = self.snapshot_dir(host, ts)?;
        remove_tree(&dir).await?;

        let records: Vec<JobRecord> = self
            .load_index(host)
            .await?
            .into_iter()
            .filter(|r| r.ts != ts)
            .collect();

        if records.is_empty() {
            let host_dir = self.host_dir(host)?;
            remove_file(&host_dir.join(INDEX_FILE)).await?;
            if is_empty_dir(&host_dir).await {
                remove_tree(&host_dir).await?;
            }
        } else {
            self.save_index(host, &records).await?;
        }

        debug!("Deleted snapshot {}/{}", host, ts);
        Ok(())
    }

    pub async fn delete_host(&self, host: &str) -> Result<()> {
        remove_tree(&self.host_dir(host)?).await?;
        debug!("Deleted host {}", host);
        Ok(())
    }

    /// Empty the whole store, leaving the root directory in place.
    pub async fn delete_all(&self) -> Result<()> {
        remove_tree(&self.root).await?;
        fs::create_dir_all(&self.root).await?;
        debug!("Deleted all snapshots under {}", self.root.display());
        Ok(())
    }

    /// Archived hosts, most recently started first.
    pub async fn list_sites(&self) -> Result<Vec<SiteSummary>> {
        let mut sites = Vec::new();

        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(sites),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let host = entry.file_name().to_string_lossy().to_string();

            let records = match self.load_index(&host).await {
                Ok(records) => records,
                Err(e) => {
                    warn!("Unreadable index for {}: {}", host, e);
                    Vec::new()
                }
            };

            sites.push(SiteSummary {
                snapshots: records.len(),
                last_ts: records.first().map(|r| r.ts.clone()),
                last_started: records.first().map(|r| r.started_at.clone()),
                host,
            });
        }

        sites.sort_by(|a, b| b.last_started.cmp(&a.last_started));
        Ok(sites)
    }
}

/// Reject names that would escape the store root.
fn check_component(kind: &str, value: &str) -> Result<()> {
    let invalid = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\'])
        || value.contains('\0');
    if invalid {
        return Err(CoreError::InvalidRequest(format!("invalid {} '{}'", kind, value)));
    }
    Ok(())
}

async fn remove_tree(path: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

async fn remove_file(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

async fn is_empty_dir(path: &Path) -> bool {
    match fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}
