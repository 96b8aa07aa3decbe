use sitesnap_crawler::CrawlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Pass confirm=ALL to delete everything")]
    ConfirmationRequired,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Crawl error: {0}")]
    CrawlError(#[from] CrawlError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
