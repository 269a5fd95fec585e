//! Shared state handed to every API handler
//!
//! Collaborators are built once at startup and passed in explicitly; there is no
//! process-wide lazily initialized pipeline.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::{
    config::Config,
    database::{CachedExecutor, QueryExecutor, SqliteDatabase},
    llm::LLMWorker,
    memory::InMemorySessionStore,
    query_engine::{ChatOrchestrator, OrchestratorConfig, QueryGenerator, QueryValidator, ResultFormatter},
};

#[derive(Clone)]
pub struct UnifiedAppState {
    pub orchestrator: Arc<ChatOrchestrator>,
    pub database: Arc<SqliteDatabase>,
}

impl UnifiedAppState {
    pub fn new(orchestrator: Arc<ChatOrchestrator>, database: Arc<SqliteDatabase>) -> Self {
        Self {
            orchestrator,
            database,
        }
    }

    /// Wire the database, model client, result cache and session store from configuration
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let database = Arc::new(SqliteDatabase::open(
            &cfg.db_path,
            cfg.db_pool_size,
            cfg.max_result_rows,
        )?);

        let executor: Arc<dyn QueryExecutor> = if cfg.enable_cache {
            info!(
                "Result cache enabled (ttl {}s, max {} entries)",
                cfg.cache_ttl_seconds, cfg.cache_max_size
            );
            Arc::new(CachedExecutor::new(
                database.clone(),
                Duration::from_secs(cfg.cache_ttl_seconds),
                cfg.cache_max_size,
            ))
        } else {
            database.clone()
        };

        let llm_worker = Arc::new(LLMWorker::new(cfg.llm_worker_config())?);

        let orchestrator = ChatOrchestrator::new(
            database.clone(),
            executor,
            QueryGenerator::new(llm_worker, cfg.generate_timeout()),
            QueryValidator::new(cfg.validation_policy()),
            ResultFormatter::new(cfg.result_preview_rows),
            Arc::new(InMemorySessionStore::new(cfg.max_history_per_session)),
            OrchestratorConfig {
                query_timeout: cfg.query_timeout(),
            },
        );

        Ok(Self::new(Arc::new(orchestrator), database))
    }
}
