// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{
    expand_root, format_bytes, parse_url_line, render_sites, render_snapshots,
};

pub use sitesnap_core::{JobManager, LinkStyle, SnapshotStore, StartRequest};
