use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{Sender, UnboundedSender};

/// Running totals reported after every stored page or asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlProgress {
    pub pages: usize,
    pub bytes: u64,
    pub limit: usize,
}

impl CrawlProgress {
    /// Completion percentage for a running job, clamped to 1..=99.
    pub fn percent(&self) -> u8 {
        let pct = self.pages.saturating_mul(100) / self.limit.max(1);
        pct.clamp(1, 99) as u8
    }
}

/// Receives progress events from a running crawl.
///
/// Errors are logged and dropped by the crawler; an observer can never stop a
/// crawl.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: CrawlProgress) -> anyhow::Result<()>;
}

impl<F> ProgressObserver for F
where
    F: Fn(CrawlProgress) + Send + Sync,
{
    fn on_progress(&self, progress: CrawlProgress) -> anyhow::Result<()> {
        self(progress);
        Ok(())
    }
}

impl ProgressObserver for UnboundedSender<CrawlProgress> {
    fn on_progress(&self, progress: CrawlProgress) -> anyhow::Result<()> {
        self.send(progress)?;
        Ok(())
    }
}

impl ProgressObserver for Sender<CrawlProgress> {
    fn on_progress(&self, progress: CrawlProgress) -> anyhow::Result<()> {
        self.try_send(progress)?;
        Ok(())
    }
}

/// Observer that discards every event.
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _progress: CrawlProgress) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_is_clamped() {
        let p = |pages| CrawlProgress {
            pages,
            bytes: 0,
            limit: 60,
        };
        assert_eq!(p(0).percent(), 1);
        assert_eq!(p(30).percent(), 50);
        assert_eq!(p(60).percent(), 99);
        assert_eq!(
            CrawlProgress {
                pages: 3,
                bytes: 0,
                limit: 0
            }
            .percent(),
            99
        );
    }

    #[tokio::test]
    async fn test_closed_channel_reports_error() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let progress = CrawlProgress {
            pages: 1,
            bytes: 10,
            limit: 5,
        };
        assert!(tx.on_progress(progress).is_err());
    }
}
