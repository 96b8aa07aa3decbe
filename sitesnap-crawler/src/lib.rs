pub mod crawler;
pub mod css;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod html;
pub mod local_path;
pub mod progress;
pub mod storage;
pub mod url_utils;

pub use crawler::{CrawlConfig, CrawlSummary, Crawler};
pub use error::CrawlError;
pub use fetch::{FetchError, Fetched, Fetcher};
pub use graph::LinkGraph;
pub use local_path::PathMapper;
pub use progress::{CrawlProgress, ProgressObserver};
pub use storage::SnapshotDir;
