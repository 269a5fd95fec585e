use crate::database::{QueryExecutor, Row, SchemaProvider};
use crate::error::PipelineError;
use crate::memory::{ConversationTurn, SessionStore};
use crate::metrics;
use crate::query_engine::{
    prompt_builder::PromptBuilder,
    query_generator::{Confidence, GeneratedQuery, QueryGenerator},
    query_validator::{sanitize, QueryValidator, ValidationVerdict},
    result_formatter::ResultFormatter,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const SCHEMA_UNAVAILABLE_RESPONSE: &str =
    "I couldn't load the database schema, so I can't answer questions about it right now.";

/// Sequences prompt building, generation, validation, execution and formatting per message
pub struct ChatOrchestrator {
    schema_provider: Arc<dyn SchemaProvider>,
    executor: Arc<dyn QueryExecutor>,
    generator: QueryGenerator,
    validator: QueryValidator,
    formatter: ResultFormatter,
    prompt_builder: PromptBuilder,
    sessions: Arc<dyn SessionStore>,
    config: OrchestratorConfig,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub query_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(30),
        }
    }
}

/// Reply to one chat message; failures are reported in `error`, never raised
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub query: Option<String>,
    pub results: Option<Vec<Row>>,
    pub error: Option<String>,
    pub confidence: Option<Confidence>,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

/// Reply to a direct query execution request
#[derive(Debug, Clone, Serialize)]
pub struct DirectQueryResponse {
    pub results: Option<Vec<Row>>,
    pub error: Option<String>,
    pub is_safe: bool,
    /// Seconds spent in the executor
    pub execution_time: Option<f64>,
}

/// What a single pipeline run produced before it is recorded
struct TurnOutcome {
    response: String,
    query: Option<String>,
    results: Option<Vec<Row>>,
    error: Option<String>,
    confidence: Option<Confidence>,
    label: &'static str,
}

impl ChatOrchestrator {
    pub fn new(
        schema_provider: Arc<dyn SchemaProvider>,
        executor: Arc<dyn QueryExecutor>,
        generator: QueryGenerator,
        validator: QueryValidator,
        formatter: ResultFormatter,
        sessions: Arc<dyn SessionStore>,
        config: OrchestratorConfig,
    ) -> Self {
        info!("Chat orchestrator initialized (query timeout {:?})", config.query_timeout);
        Self {
            schema_provider,
            executor,
            generator,
            validator,
            formatter,
            prompt_builder: PromptBuilder::new(),
            sessions,
            config,
        }
    }

    pub fn validator(&self) -> &QueryValidator {
        &self.validator
    }

    /// Run the full pipeline for one message and record the turn.
    ///
    /// The turn is appended only once a response exists, so dropping this future
    /// part-way through leaves the session untouched.
    pub async fn handle_message(&self, session_id: &str, user_message: &str) -> ChatResponse {
        info!("Handling message for session {}", session_id);
        let history = self.sessions.history(session_id);

        let outcome = self.run_pipeline(&history, user_message).await;

        let row_count = outcome.results.as_ref().map(Vec::len);
        let turn = ConversationTurn::new(user_message, outcome.response.clone())
            .with_query(outcome.query.clone())
            .with_result_row_count(row_count);
        self.sessions.append(session_id, turn);

        metrics::inc_outcome(outcome.label);
        metrics::set_tracked_sessions(self.sessions.session_count());
        info!("Session {} turn recorded (outcome: {})", session_id, outcome.label);

        ChatResponse {
            response: outcome.response,
            query: outcome.query,
            results: outcome.results,
            error: outcome.error,
            confidence: outcome.confidence,
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
        }
    }

    async fn run_pipeline(&self, history: &[ConversationTurn], user_message: &str) -> TurnOutcome {
        let schema = match self.schema_provider.fetch_schema().await {
            Ok(schema) => schema,
            Err(e) => {
                let err = PipelineError::Schema(e.to_string());
                warn!("{}", err);
                return TurnOutcome {
                    response: SCHEMA_UNAVAILABLE_RESPONSE.to_string(),
                    query: None,
                    results: None,
                    error: Some(err.to_string()),
                    confidence: None,
                    label: err.outcome(),
                };
            }
        };

        let prompt = self.prompt_builder.build(&schema, history, user_message);
        debug!(
            "Prompt built ({} table(s), {} history turn(s))",
            schema.tables.len(),
            history.len()
        );

        let reply = self.generator.request(&prompt).await;
        let generation_error = reply
            .failure_reason()
            .map(|reason| PipelineError::Generation(reason.to_string()));
        let GeneratedQuery {
            query,
            explanation,
            confidence,
        } = reply.into();

        let Some(candidate) = query else {
            let label = generation_error.as_ref().map_or("no_query", PipelineError::outcome);
            return TurnOutcome {
                response: explanation,
                query: None,
                results: None,
                error: generation_error.map(|e| e.to_string()),
                confidence: Some(confidence),
                label,
            };
        };

        let verdict = self.validator.is_safe(&candidate);
        if !verdict.is_safe {
            warn!("Generated query rejected: {}", verdict.reason);
            return TurnOutcome {
                response: explanation,
                query: None,
                results: None,
                error: Some(format!("Query validation failed: {}", verdict.reason)),
                confidence: Some(confidence),
                label: "rejected",
            };
        }

        let sanitized = sanitize(&candidate);
        match self.execute(&sanitized).await {
            Ok(rows) => {
                info!("Query returned {} row(s)", rows.len());
                TurnOutcome {
                    response: self.formatter.format(&explanation, &rows),
                    query: Some(sanitized),
                    results: Some(rows),
                    error: None,
                    confidence: Some(confidence),
                    label: "answered",
                }
            }
            Err(err) => {
                warn!("{}", err);
                TurnOutcome {
                    response: explanation,
                    query: Some(sanitized),
                    results: None,
                    error: Some(err.to_string()),
                    confidence: Some(confidence),
                    label: err.outcome(),
                }
            }
        }
    }

    async fn execute(&self, query: &str) -> Result<Vec<Row>, PipelineError> {
        let started = Instant::now();
        let result = tokio::time::timeout(self.config.query_timeout, self.executor.execute_select(query)).await;
        metrics::observe_execution(started.elapsed().as_secs_f64());

        match result {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(e)) => Err(PipelineError::Execution(e.to_string())),
            Err(_) => Err(PipelineError::ExecutionTimeout {
                seconds: self.config.query_timeout.as_secs(),
            }),
        }
    }

    pub fn get_history(&self, session_id: &str) -> Vec<ConversationTurn> {
        self.sessions.history(session_id)
    }

    pub fn clear_history(&self, session_id: &str) {
        self.sessions.clear(session_id);
        metrics::set_tracked_sessions(self.sessions.session_count());
        info!("Cleared history for session {}", session_id);
    }

    pub fn validate(&self, query: &str) -> ValidationVerdict {
        self.validator.is_safe(query)
    }

    /// Validate and optionally run a caller-supplied query, bypassing generation
    pub async fn execute_direct(&self, query: &str, validate_only: bool) -> DirectQueryResponse {
        let verdict = self.validator.is_safe(query);
        if !verdict.is_safe {
            return DirectQueryResponse {
                results: None,
                error: Some(format!("Query validation failed: {}", verdict.reason)),
                is_safe: false,
                execution_time: None,
            };
        }

        if validate_only {
            return DirectQueryResponse {
                results: None,
                error: None,
                is_safe: true,
                execution_time: None,
            };
        }

        let started = Instant::now();
        let result = self.execute(&sanitize(query)).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(rows) => DirectQueryResponse {
                results: Some(rows),
                error: None,
                is_safe: true,
                execution_time: Some(elapsed),
            },
            Err(err) => DirectQueryResponse {
                results: None,
                error: Some(err.to_string()),
                is_safe: true,
                execution_time: Some(elapsed),
            },
        }
    }
}
