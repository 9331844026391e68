//! Search index collaborator seam.
//!
//! Index construction is external to this crate; callers only ever ask for
//! a full rebuild. Rebuilds are idempotent and safe to repeat, so callers
//! batch them (the scheduler issues one rebuild per tick, not one per job).

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::warn;

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn rebuild(&self) -> anyhow::Result<()>;
}

/// Trigger a rebuild, swallowing failures. An index that lags behind is a
/// degraded search experience, never a rolled-back mutation.
pub async fn rebuild_safe(index: &dyn SearchIndex) {
    if let Err(error) = index.rebuild().await {
        warn!(error = %error, "search index rebuild failed");
    }
}

/// Placeholder used when no external index is wired in.
#[derive(Debug, Default)]
pub struct NoopIndex;

#[async_trait]
impl SearchIndex for NoopIndex {
    async fn rebuild(&self) -> anyhow::Result<()> {
        tracing::debug!("index rebuild requested (noop)");
        Ok(())
    }
}

/// Counts rebuild calls; used by the test suites to assert batching.
#[derive(Debug, Default)]
pub struct CountingIndex {
    rebuilds: AtomicUsize,
}

impl CountingIndex {
    pub fn rebuilds(&self) -> usize {
        self.rebuilds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchIndex for CountingIndex {
    async fn rebuild(&self) -> anyhow::Result<()> {
        self.rebuilds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
