//! Time-bounded cache in front of a query executor
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use crate::database::{QueryExecutor, Row};

/// Wraps another executor and remembers successful results by query text.
///
/// Keys are the exact (sanitized) SQL, so two spellings of the same query are cached
/// separately. Failures are never cached.
pub struct CachedExecutor {
    inner: Arc<dyn QueryExecutor>,
    cache: Cache<String, Arc<Vec<Row>>>,
}

impl CachedExecutor {
    pub fn new(inner: Arc<dyn QueryExecutor>, ttl: Duration, max_entries: u64) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

#[async_trait]
impl QueryExecutor for CachedExecutor {
    async fn execute_select(&self, query: &str) -> anyhow::Result<Vec<Row>> {
        if let Some(rows) = self.cache.get(query).await {
            debug!("Result cache hit ({} rows)", rows.len());
            return Ok(rows.as_ref().clone());
        }

        let rows = self.inner.execute_select(query).await?;
        self.cache.insert(query.to_string(), Arc::new(rows.clone())).await;
        Ok(rows)
    }
}
