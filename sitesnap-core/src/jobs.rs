//! Job control: starting mirror runs, tracking their status, and guarding
//! deletion of snapshots that are still being written.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use sitesnap_crawler::crawler::validate_root;
use sitesnap_crawler::url_utils::host_id;
use sitesnap_crawler::{
    CrawlConfig, CrawlProgress, CrawlSummary, Crawler, PathMapper, ProgressObserver,
};
use tracing::{error, info, warn};

use crate::DELETE_ALL_CONFIRMATION;
use crate::error::{CoreError, Result};
use crate::record::{JobId, JobRecord, JobStatus, format_time, job_timestamps};
use crate::store::SnapshotStore;

pub const DEFAULT_DEPTH: usize = 1;
pub const DEFAULT_MAX_PAGES: usize = 60;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How rewritten pages refer to their local copies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkStyle {
    /// Absolute links under `/archive/<host>/<ts>/local/`
    #[default]
    Archive,
    /// Bare file names, for browsing the `local/` directory straight from disk
    Relative,
}

/// Parameters for starting a job.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub url: String,
    pub depth: Option<usize>,
    pub max_pages: Option<usize>,
    pub link_style: LinkStyle,
}

impl StartRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: None,
            max_pages: None,
            link_style: LinkStyle::default(),
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub fn with_link_style(mut self, link_style: LinkStyle) -> Self {
        self.link_style = link_style;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobDetails {
    pub pages: usize,
    pub bytes: u64,
    pub limit: usize,
}

/// In-memory view of a job, as returned by the status operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobState {
    pub status: JobStatus,
    pub progress: u8,
    pub host: String,
    pub ts: String,
    pub url: String,
    pub started_at: String,
    pub details: JobDetails,
    pub error: Option<String>,
}

impl JobState {
    pub fn running(id: &JobId, url: &str, started_at: &str, limit: usize) -> Self {
        let details = JobDetails {
            pages: 0,
            bytes: 0,
            limit,
        };
        Self {
            status: JobStatus::Running,
            progress: percent(&details),
            host: id.host.clone(),
            ts: id.ts.clone(),
            url: url.to_string(),
            started_at: started_at.to_string(),
            details,
            error: None,
        }
    }
}

fn percent(details: &JobDetails) -> u8 {
    CrawlProgress {
        pages: details.pages,
        bytes: details.bytes,
        limit: details.limit,
    }
    .percent()
}

/// Status of every job started in this process.
///
/// Only the owning [`JobManager`] writes here; a running crawl reaches its
/// own entry through [`JobProgress`] and nothing else.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<JobId, JobState>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, JobState>> {
        // A poisoned map is still consistent: every update is a single insert
        // or field assignment.
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new job. Fails if the id is already taken.
    pub fn insert(&self, id: JobId, state: JobState) -> Result<()> {
        let mut jobs = self.lock();
        if jobs.contains_key(&id) {
            return Err(CoreError::Conflict(format!("job {} already exists", id)));
        }
        jobs.insert(id, state);
        Ok(())
    }

    pub fn get(&self, id: &JobId) -> Option<JobState> {
        self.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn is_running(&self, id: &JobId) -> bool {
        self.lock()
            .get(id)
            .is_some_and(|state| state.status.is_running())
    }

    pub fn any_running_for_host(&self, host: &str) -> bool {
        self.lock()
            .iter()
            .any(|(id, state)| id.host == host && state.status.is_running())
    }

    pub fn any_running(&self) -> bool {
        self.lock().values().any(|state| state.status.is_running())
    }

    fn update_progress(&self, id: &JobId, progress: CrawlProgress) -> bool {
        let mut jobs = self.lock();
        match jobs.get_mut(id) {
            Some(state) if state.status.is_running() => {
                state.details = JobDetails {
                    pages: progress.pages,
                    bytes: progress.bytes,
                    limit: progress.limit,
                };
                state.progress = progress.percent();
                true
            }
            _ => false,
        }
    }

    fn finish_success(&self, id: &JobId, summary: &CrawlSummary) {
        let mut jobs = self.lock();
        if let Some(state) = jobs.get_mut(id) {
            if !state.status.is_running() {
                warn!("Job {} already finalized as {}", id, state.status);
                return;
            }
            state.status = JobStatus::Success;
            state.progress = 100;
            state.details.pages = summary.pages_fetched;
            state.details.bytes = summary.bytes_stored;
        }
    }

    fn finish_error(&self, id: &JobId, message: &str) {
        let mut jobs = self.lock();
        if let Some(state) = jobs.get_mut(id) {
            if !state.status.is_running() {
                warn!("Job {} already finalized as {}", id, state.status);
                return;
            }
            state.status = JobStatus::Error;
            state.error = Some(message.to_string());
        }
    }

    fn remove(&self, id: &JobId) {
        self.lock().remove(id);
    }

    fn remove_host(&self, host: &str) {
        self.lock().retain(|id, _| id.host != host);
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// Progress observer bound to one job's registry entry.
pub struct JobProgress {
    id: JobId,
    registry: JobRegistry,
}

impl ProgressObserver for JobProgress {
    fn on_progress(&self, progress: CrawlProgress) -> anyhow::Result<()> {
        if !self.registry.update_progress(&self.id, progress) {
            anyhow::bail!("job {} is no longer running", self.id);
        }
        Ok(())
    }
}

/// Starts jobs, reports their status, and deletes finished snapshots.
#[derive(Debug, Clone)]
pub struct JobManager {
    store: SnapshotStore,
    registry: JobRegistry,
    timeout: Option<Duration>,
}

impl JobManager {
    pub fn new(store: SnapshotStore) -> Self {
        Self::with_registry(store, JobRegistry::new())
    }

    pub fn with_registry(store: SnapshotStore, registry: JobRegistry) -> Self {
        Self {
            store,
            registry,
            timeout: None,
        }
    }

    /// Override the per-request fetch timeout of jobs started from here.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Validate the request, register the job, and run it on a background
    /// task. Must be called from within a tokio runtime.
    pub fn start(&self, request: StartRequest) -> Result<JobId> {
        let root = validate_root(&request.url)?;
        let host = host_id(&root)
            .ok_or_else(|| CoreError::InvalidRequest(format!("{}: missing host", root)))?;

        let depth = request.depth.unwrap_or(DEFAULT_DEPTH);
        let max_pages = request.max_pages.unwrap_or(DEFAULT_MAX_PAGES);
        if max_pages == 0 {
            return Err(CoreError::InvalidRequest(
                "max_pages must be at least 1".to_string(),
            ));
        }

        let (ts, started_at) = job_timestamps(Utc::now());
        let id = JobId::new(host, ts);

        self.registry
            .insert(id.clone(), JobState::running(&id, &root, &started_at, max_pages))?;

        let mapper = match request.link_style {
            LinkStyle::Archive => PathMapper::archive(&id.host, &id.ts),
            LinkStyle::Relative => PathMapper::relative(),
        };

        let mut config = CrawlConfig::new(root)
            .with_max_depth(depth)
            .with_page_limit(max_pages);
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        info!("Starting job {} for {}", id, config.root_url);

        let job = JobRun {
            id: id.clone(),
            store: self.store.clone(),
            registry: self.registry.clone(),
            config,
            mapper,
            started_at,
        };
        tokio::spawn(job.run());

        Ok(id)
    }

    pub fn status(&self, id: &JobId) -> Result<JobState> {
        self.registry
            .get(id)
            .ok_or_else(|| CoreError::NotFound(format!("job {}", id)))
    }

    /// Resolve once the job has left `running`.
    pub async fn wait(&self, id: &JobId) -> Result<JobState> {
        loop {
            let state = self.status(id)?;
            if !state.status.is_running() {
                return Ok(state);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    pub async fn list_sites(&self) -> Result<Vec<crate::record::SiteSummary>> {
        self.store.list_sites().await
    }

    pub async fn host_snapshots(&self, host: &str) -> Result<Vec<JobRecord>> {
        self.store.load_index(host).await
    }

    pub async fn delete_snapshot(&self, host: &str, ts: &str) -> Result<()> {
        let id = JobId::new(host, ts);
        if self.registry.is_running(&id) {
            return Err(CoreError::Conflict(
                "Cannot delete while capture is running".to_string(),
            ));
        }
        self.store.delete_snapshot(host, ts).await?;
        self.registry.remove(&id);
        Ok(())
    }

    pub async fn delete_host(&self, host: &str) -> Result<()> {
        if self.registry.any_running_for_host(host) {
            return Err(CoreError::Conflict(
                "Cannot delete while a capture is running for this host".to_string(),
            ));
        }
        self.store.delete_host(host).await?;
        self.registry.remove_host(host);
        Ok(())
    }

    pub async fn delete_all(&self, confirm: Option<&str>) -> Result<()> {
        if confirm != Some(DELETE_ALL_CONFIRMATION) {
            return Err(CoreError::ConfirmationRequired);
        }
        if self.registry.any_running() {
            return Err(CoreError::Conflict(
                "Cannot delete while any capture is running".to_string(),
            ));
        }
        self.store.delete_all().await?;
        self.registry.clear();
        Ok(())
    }
}

/// Everything a background job needs, moved onto its task.
struct JobRun {
    id: JobId,
    store: SnapshotStore,
    registry: JobRegistry,
    config: CrawlConfig,
    mapper: PathMapper,
    started_at: String,
}

impl JobRun {
    async fn run(self) {
        let result = self.crawl().await;

        let details = self
            .registry
            .get(&self.id)
            .map(|state| state.details)
            .unwrap_or(JobDetails {
                pages: 0,
                bytes: 0,
                limit: self.config.page_limit,
            });

        let (status, count_fetched, bytes_stored, error) = match &result {
            Ok(summary) => (
                JobStatus::Success,
                summary.pages_fetched,
                summary.bytes_stored,
                None,
            ),
            Err(e) => (JobStatus::Error, details.pages, details.bytes, Some(e.to_string())),
        };

        let record = JobRecord {
            host: self.id.host.clone(),
            started_at: self.started_at.clone(),
            finished_at: Some(format_time(Utc::now())),
            root_url: self.config.root_url.clone(),
            depth: self.config.max_depth,
            count_fetched,
            bytes_stored,
            status,
            error: error.clone(),
            ts: self.id.ts.clone(),
        };

        if let Err(e) = self.store.prepend_record(record).await {
            error!("Could not record job {} in the host index: {}", self.id, e);
        }

        match result {
            Ok(summary) => {
                info!(
                    "Job {} finished: {} pages, {} bytes",
                    self.id, summary.pages_fetched, summary.bytes_stored
                );
                self.registry.finish_success(&self.id, &summary);
            }
            Err(e) => {
                error!("Job {} failed: {}", self.id, e);
                self.registry.finish_error(&self.id, &e.to_string());
            }
        }
    }

    async fn crawl(&self) -> Result<CrawlSummary> {
        let snapshot = self
            .store
            .ensure_directories(&self.id.host, &self.id.ts)
            .await?;

        let observer = JobProgress {
            id: self.id.clone(),
            registry: self.registry.clone(),
        };

        let crawler = Crawler::new(self.config.clone(), snapshot, self.mapper.clone())?
            .with_observer(Arc::new(observer));

        Ok(crawler.run().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_state(id: &JobId) -> JobState {
        JobState::running(id, "https://example.com/", "2025-01-01T00:00:00Z", 60)
    }

    #[test]
    fn test_progress_updates_only_running_jobs() {
        let registry = JobRegistry::new();
        let id = JobId::new("example.com", "20250101T000000Z");
        registry.insert(id.clone(), running_state(&id)).unwrap();

        let observer = JobProgress {
            id: id.clone(),
            registry: registry.clone(),
        };
        observer
            .on_progress(CrawlProgress {
                pages: 30,
                bytes: 1000,
                limit: 60,
            })
            .unwrap();
        let state = registry.get(&id).unwrap();
        assert_eq!(state.progress, 50);
        assert_eq!(state.details.bytes, 1000);

        registry.finish_error(&id, "boom");
        assert!(
            observer
                .on_progress(CrawlProgress {
                    pages: 31,
                    bytes: 1001,
                    limit: 60,
                })
                .is_err()
        );
        assert_eq!(registry.get(&id).unwrap().details.pages, 30);
    }

    #[test]
    fn test_terminal_status_is_never_overwritten() {
        let registry = JobRegistry::new();
        let id = JobId::new("example.com", "20250101T000000Z");
        registry.insert(id.clone(), running_state(&id)).unwrap();

        registry.finish_error(&id, "first");
        registry.finish_success(&id, &CrawlSummary::default());

        let state = registry.get(&id).unwrap();
        assert_eq!(state.status, JobStatus::Error);
        assert_eq!(state.error.as_deref(), Some("first"));
    }

    #[test]
    fn test_duplicate_job_id_conflicts() {
        let registry = JobRegistry::new();
        let id = JobId::new("example.com", "20250101T000000Z");
        registry.insert(id.clone(), running_state(&id)).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.insert(id.clone(), running_state(&id)),
            Err(CoreError::Conflict(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_new_job_reports_minimum_progress() {
        let id = JobId::new("example.com", "20250101T000000Z");
        assert_eq!(running_state(&id).progress, 1);
    }
}
