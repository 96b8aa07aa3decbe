use thiserror::Error;

use crate::fetch::FetchError;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("HTTP client setup failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Fetch failed: {0}")]
    FetchError(#[from] FetchError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Rewrite error: {0}")]
    RewriteError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CrawlError>;
