use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use html_escape::{encode_double_quoted_attribute, encode_text};
use tracing::{debug, info, warn};
use url::Url;

use crate::css::rewrite_css;
use crate::error::{CrawlError, Result};
use crate::fetch::{FETCH_TIMEOUT, Fetched, Fetcher, MAX_IN_FLIGHT, USER_AGENT};
use crate::graph::LinkGraph;
use crate::html::rewrite_html;
use crate::local_path::{self, PathMapper};
use crate::progress::{CrawlProgress, NoProgress, ProgressObserver};
use crate::storage::{LANDING_FILE, SnapshotDir, write_text};
use crate::url_utils::same_host;

pub const DEFAULT_MAX_DEPTH: usize = 1;
pub const DEFAULT_PAGE_LIMIT: usize = 60;
/// Forced extension of the marker written for a page that could not be fetched.
pub const ERROR_MARKER_EXT: &str = ".error.txt";

/// Settings for one mirroring run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub root_url: String,
    pub max_depth: usize,
    pub page_limit: usize,
    pub max_in_flight: usize,
    pub timeout: Duration,
    pub user_agent: String,
}

impl CrawlConfig {
    pub fn new(root_url: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            page_limit: DEFAULT_PAGE_LIMIT,
            max_in_flight: MAX_IN_FLIGHT,
            timeout: FETCH_TIMEOUT,
            user_agent: USER_AGENT.to_string(),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = limit;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Totals of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub pages_fetched: usize,
    pub bytes_stored: u64,
    pub failed_fetches: usize,
    pub assets_stored: usize,
    pub graph_nodes: usize,
    pub graph_edges: usize,
    /// Frontier entries left unvisited when the page limit was reached.
    pub frontier_remaining: usize,
}

/// Mutable state of a run. Owned by the single task driving the crawl.
struct CrawlState {
    frontier: VecDeque<(String, usize)>,
    visited: HashSet<String>,
    stored_assets: HashSet<String>,
    graph: LinkGraph,
    pages: usize,
    bytes: u64,
    failed: usize,
}

impl CrawlState {
    fn new(root: &str) -> Self {
        let mut visited = HashSet::new();
        visited.insert(root.to_string());

        let mut frontier = VecDeque::new();
        frontier.push_back((root.to_string(), 0));

        Self {
            frontier,
            visited,
            stored_assets: HashSet::new(),
            graph: LinkGraph::new(),
            pages: 0,
            bytes: 0,
            failed: 0,
        }
    }
}

/// Breadth-first mirror of a single host.
pub struct Crawler {
    root: String,
    config: CrawlConfig,
    fetcher: Fetcher,
    mapper: PathMapper,
    snapshot: SnapshotDir,
    observer: Arc<dyn ProgressObserver>,
}

impl Crawler {
    pub fn new(config: CrawlConfig, snapshot: SnapshotDir, mapper: PathMapper) -> Result<Self> {
        let root = validate_root(&config.root_url)?;
        let fetcher =
            Fetcher::with_settings(config.max_in_flight, config.timeout, &config.user_agent)?;

        Ok(Self {
            root,
            config,
            fetcher,
            mapper,
            snapshot,
            observer: Arc::new(NoProgress),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The normalized root URL the crawl starts from.
    pub fn root_url(&self) -> &str {
        &self.root
    }

    pub fn snapshot(&self) -> &SnapshotDir {
        &self.snapshot
    }

    pub async fn run(&self) -> Result<CrawlSummary> {
        info!(
            "Starting mirror of {} (depth {}, page limit {})",
            self.root, self.config.max_depth, self.config.page_limit
        );

        let mut state = CrawlState::new(&self.root);

        while state.pages < self.config.page_limit {
            let Some((url, depth)) = state.frontier.pop_front() else {
                break;
            };

            if depth > self.config.max_depth {
                debug!("Discarding {} at depth {}", url, depth);
                continue;
            }

            let page = match self.fetcher.fetch(&url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Fetch failed for {}: {}", url, e);
                    state.failed += 1;
                    let marker = local_path::file_name(&url, Some(ERROR_MARKER_EXT));
                    self.snapshot
                        .write_original(&marker, e.to_string().as_bytes())
                        .await?;
                    continue;
                }
            };

            state.pages += 1;
            state.bytes += page.body.len() as u64;
            self.report(&state);
            state.graph.add_node(&url);

            if page.is_html() {
                self.process_page(&mut state, &url, depth, &page).await?;
            } else {
                debug!("Storing non-HTML page {} ({})", url, page.content_type);
                self.snapshot
                    .write_local(&self.mapper.file_name(&url), &page.body)
                    .await?;
            }
        }

        self.write_landing_page().await?;
        write_text(&self.snapshot.graph_path(), &state.graph.to_json()?).await?;

        let summary = CrawlSummary {
            pages_fetched: state.pages,
            bytes_stored: state.bytes,
            failed_fetches: state.failed,
            assets_stored: state.stored_assets.len(),
            graph_nodes: state.graph.node_count(),
            graph_edges: state.graph.edge_count(),
            frontier_remaining: state.frontier.len(),
        };

        info!(
            "Mirror of {} complete: {} pages, {} bytes, {} assets, {} failed",
            self.root,
            summary.pages_fetched,
            summary.bytes_stored,
            summary.assets_stored,
            summary.failed_fetches
        );

        Ok(summary)
    }

    async fn process_page(
        &self,
        state: &mut CrawlState,
        url: &str,
        depth: usize,
        page: &Fetched,
    ) -> Result<()> {
        let html = String::from_utf8_lossy(&page.body);
        let rewritten = rewrite_html(url, &html, &self.mapper)?;

        let name = self.mapper.file_name(url);
        self.snapshot.write_original(&name, html.as_bytes()).await?;
        self.snapshot
            .write_local(&name, rewritten.html.as_bytes())
            .await?;

        debug!(
            "{}: {} links, {} assets",
            url,
            rewritten.links.len(),
            rewritten.assets.len()
        );

        for link in rewritten.links {
            if !same_host(url, &link) {
                continue;
            }
            state.graph.add_edge(url, &link);
            if state.visited.insert(link.clone()) {
                state.frontier.push_back((link, depth + 1));
            }
        }

        self.store_assets(state, &rewritten.assets).await;
        Ok(())
    }

    /// Fetch and store a page's assets. Stylesheets are rewritten and their
    /// own references fetched one level deep. Failures are dropped.
    async fn store_assets(&self, state: &mut CrawlState, assets: &[String]) {
        let pending: Vec<&String> = assets
            .iter()
            .filter(|asset| !state.stored_assets.contains(asset.as_str()))
            .collect();

        let results = join_all(pending.iter().map(|asset| self.fetcher.fetch(asset))).await;

        for (asset, result) in pending.into_iter().zip(results) {
            let fetched = match result {
                Ok(fetched) => fetched,
                Err(e) => {
                    debug!("Skipping asset {}: {}", asset, e);
                    continue;
                }
            };

            if is_stylesheet(asset, &fetched) {
                let css = String::from_utf8_lossy(&fetched.body);
                let (rewritten, nested) = rewrite_css(asset, &css, &self.mapper);
                if self.store(state, asset, rewritten.as_bytes()).await {
                    self.store_nested_assets(state, &nested).await;
                }
            } else {
                self.store(state, asset, &fetched.body).await;
            }
        }
    }

    /// Assets referenced from a stylesheet are stored raw, never parsed.
    async fn store_nested_assets(&self, state: &mut CrawlState, assets: &[String]) {
        let pending: Vec<&String> = assets
            .iter()
            .filter(|asset| !state.stored_assets.contains(asset.as_str()))
            .collect();

        let results = join_all(pending.iter().map(|asset| self.fetcher.fetch(asset))).await;

        for (asset, result) in pending.into_iter().zip(results) {
            match result {
                Ok(fetched) => {
                    self.store(state, asset, &fetched.body).await;
                }
                Err(e) => debug!("Skipping nested asset {}: {}", asset, e),
            }
        }
    }

    async fn store(&self, state: &mut CrawlState, asset: &str, content: &[u8]) -> bool {
        let name = self.mapper.file_name(asset);
        if let Err(e) = self.snapshot.write_local(&name, content).await {
            debug!("Could not store asset {}: {}", asset, e);
            return false;
        }

        state.stored_assets.insert(asset.to_string());
        state.bytes += content.len() as u64;
        self.report(state);
        true
    }

    fn report(&self, state: &CrawlState) {
        let progress = CrawlProgress {
            pages: state.pages,
            bytes: state.bytes,
            limit: self.config.page_limit,
        };
        if let Err(e) = self.observer.on_progress(progress) {
            debug!("Progress observer failed: {}", e);
        }
    }

    async fn write_landing_page(&self) -> Result<()> {
        let root = encode_text(&self.root);
        let href = self.mapper.local_path(&self.root);
        let landing = format!(
            r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Archived {root}</title></head>
<body>
  <h3>Archived root: {root}</h3>
  <ul>
    <li><a href="{href}">Open archived root page</a></li>
  </ul>
</body></html>
"#,
            root = root,
            href = encode_double_quoted_attribute(&href),
        );

        write_text(&self.snapshot.local_path(LANDING_FILE), &landing).await?;
        Ok(())
    }
}

fn is_stylesheet(url: &str, fetched: &Fetched) -> bool {
    fetched.is_css() || local_path::url_extension(url) == ".css"
}

/// Parse the root URL, requiring http(s) with a host, and drop its fragment.
pub fn validate_root(root_url: &str) -> Result<String> {
    let mut url = Url::parse(root_url.trim())
        .map_err(|e| CrawlError::InvalidUrl(format!("{}: {}", root_url, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(CrawlError::InvalidUrl(format!(
            "{}: only http and https are supported",
            root_url
        )));
    }
    if url.host_str().is_none() {
        return Err(CrawlError::InvalidUrl(format!("{}: missing host", root_url)));
    }

    url.set_fragment(None);
    Ok(url.to_string())
}
