//! Query engine module - natural language to validated, executed SQL

pub mod prompt_builder;
pub mod query_generator;
pub mod query_validator;
pub mod result_formatter;
pub mod orchestrator;

pub use prompt_builder::{Prompt, PromptBuilder};
pub use query_generator::{parse_reply, Confidence, GeneratedQuery, ModelReply, QueryGenerator};
pub use query_validator::{sanitize, QueryValidator, ValidationPolicy, ValidationVerdict};
pub use result_formatter::ResultFormatter;
pub use orchestrator::{ChatOrchestrator, ChatResponse, DirectQueryResponse, OrchestratorConfig};
