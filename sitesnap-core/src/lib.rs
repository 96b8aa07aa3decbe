pub mod error;
pub mod jobs;
pub mod record;
pub mod store;

pub use error::CoreError;
pub use jobs::{JobManager, JobRegistry, JobState, LinkStyle, StartRequest};
pub use record::{JobId, JobRecord, JobStatus, SiteSummary};
pub use store::SnapshotStore;

/// Token that must accompany a request to delete every snapshot.
pub const DELETE_ALL_CONFIRMATION: &str = "ALL";
