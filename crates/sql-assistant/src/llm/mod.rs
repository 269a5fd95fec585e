//! Generative-model access
//!
//! The pipeline only depends on [`TextGenerator`]; [`LLMWorker`] is the HTTP-backed
//! implementation used by the server.

pub mod llm_worker;

pub use llm_worker::{LLMWorker, LLMWorkerConfig};

use async_trait::async_trait;

/// Opaque text generation capability: prompts in, text out. May fail or stall.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, system_prompt: &str, user_prompt: &str) -> anyhow::Result<String>;
}
