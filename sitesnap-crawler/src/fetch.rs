use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::debug;

/// Maximum number of requests in flight for one job.
pub const MAX_IN_FLIGHT: usize = 8;
/// Total time budget for a single request, body included.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(20);
pub const USER_AGENT: &str = "sitesnap/0.1 (https://github.com/trapdoorsec/sitesnap)";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("fetch gate closed")]
    GateClosed,
}

impl FetchError {
    fn classify(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if err.is_connect() {
            FetchError::Connect(err.to_string())
        } else {
            FetchError::Request(err)
        }
    }
}

/// A fetched response body. The status code is kept for logging only.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub url: String,
    pub status_code: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Fetched {
    pub fn is_html(&self) -> bool {
        self.content_type.to_ascii_lowercase().contains("text/html")
    }

    pub fn is_css(&self) -> bool {
        self.content_type.to_ascii_lowercase().contains("text/css")
    }
}

/// HTTP GET with a job-wide concurrency gate.
///
/// Clones share the client and the gate, so every request issued for a job
/// counts against the same limit.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    gate: Arc<Semaphore>,
}

impl Fetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_settings(MAX_IN_FLIGHT, FETCH_TIMEOUT, USER_AGENT)
    }

    pub fn with_settings(
        max_in_flight: usize,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(max_in_flight)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            gate: Arc::new(Semaphore::new(max_in_flight.max(1))),
        })
    }

    /// Requests currently allowed to start.
    pub fn available_permits(&self) -> usize {
        self.gate.available_permits()
    }

    pub async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        // Held until the body is read; dropped on every return path.
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| FetchError::GateClosed)?;

        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::classify)?;

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response.bytes().await.map_err(FetchError::classify)?;

        debug!(
            "Fetched {} ({}, {} bytes, {})",
            url,
            status_code,
            body.len(),
            content_type
        );

        Ok(Fetched {
            url: url.to_string(),
            status_code,
            content_type,
            body: body.to_vec(),
        })
    }
}
