use std::path::{Path, PathBuf};

use tokio::fs;

pub const ORIGINAL_DIR: &str = "original";
pub const LOCAL_DIR: &str = "local";
pub const GRAPH_FILE: &str = "graph.json";
pub const LANDING_FILE: &str = "index.html";

/// Write `content`, creating parent directories and overwriting any existing
/// file.
pub async fn write_bytes(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content).await
}

pub async fn write_text(path: &Path, content: &str) -> std::io::Result<()> {
    write_bytes(path, content.as_bytes()).await
}

/// Storage subtree of one crawl job: `<root>/<host>/<ts>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDir {
    root: PathBuf,
}

impl SnapshotDir {
    /// Create `original/` and `local/` under `root`. Idempotent.
    pub async fn ensure(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(ORIGINAL_DIR)).await?;
        fs::create_dir_all(root.join(LOCAL_DIR)).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn original_path(&self, name: &str) -> PathBuf {
        self.root.join(ORIGINAL_DIR).join(name)
    }

    pub fn local_path(&self, name: &str) -> PathBuf {
        self.root.join(LOCAL_DIR).join(name)
    }

    pub fn graph_path(&self) -> PathBuf {
        self.root.join(GRAPH_FILE)
    }

    pub async fn write_original(&self, name: &str, content: &[u8]) -> std::io::Result<()> {
        write_bytes(&self.original_path(name), content).await
    }

    pub async fn write_local(&self, name: &str, content: &[u8]) -> std::io::Result<()> {
        write_bytes(&self.local_path(name), content).await
    }
}
