//! Request-scoped pipeline failures
//!
//! None of these ever escape `handle_message`; they are folded into the response's
//! `error` field and counted by outcome.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to load database schema: {0}")]
    Schema(String),

    #[error("Query generation failed: {0}")]
    Generation(String),

    #[error("Query execution failed: {0}")]
    Execution(String),

    #[error("Query execution failed: timed out after {seconds}s")]
    ExecutionTimeout { seconds: u64 },
}

impl PipelineError {
    /// Metrics label for the stage that failed
    pub fn outcome(&self) -> &'static str {
        match self {
            PipelineError::Schema(_) | PipelineError::Generation(_) => "upstream_failed",
            PipelineError::Execution(_) | PipelineError::ExecutionTimeout { .. } => "execution_failed",
        }
    }
}
