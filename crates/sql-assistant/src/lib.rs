// sql-assistant/crates/sql-assistant/src/lib.rs

pub mod config;
pub mod database;
pub mod error;
pub mod llm;
pub mod memory;
pub mod metrics;
pub mod query_engine;
pub mod shared_state;
pub mod telemetry;
pub mod utils;

#[cfg(feature = "cli")]
pub mod api;
#[cfg(feature = "cli")]
pub mod server;

// Public API exports
pub use config::Config;
pub use database::{QueryExecutor, SchemaMetadata, SchemaProvider, SqliteDatabase};
pub use error::PipelineError;
pub use llm::{LLMWorker, TextGenerator};
pub use memory::{ConversationTurn, InMemorySessionStore, SessionStore};
pub use query_engine::{
    ChatOrchestrator, ChatResponse, Confidence, GeneratedQuery, QueryValidator, ValidationVerdict,
};

#[cfg(feature = "cli")]
pub use server::run_server;
