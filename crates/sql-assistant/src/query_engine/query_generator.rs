//! Turns a prompt into a candidate query via the generative model
//!
//! Replies are parsed optimistically: the JSON object may be the whole reply, sit inside
//! a Markdown fence, or be embedded in prose. Anything else degrades to an unparsed
//! reply whose text is shown to the user instead of being dropped.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::llm::TextGenerator;
use crate::query_engine::prompt_builder::Prompt;
use crate::utils::TextUtils;

const MAX_RAW_REPLY_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }

    /// Unknown labels count as low confidence
    fn from_label(label: Option<&str>) -> Self {
        match label.map(|l| l.trim().to_ascii_lowercase()).as_deref() {
            Some("high") => Confidence::High,
            Some("medium") => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the pipeline works with after generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub query: Option<String>,
    pub explanation: String,
    pub confidence: Confidence,
}

/// Outcome of one round trip to the model
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Parsed {
        query: Option<String>,
        explanation: String,
        confidence: Confidence,
    },
    Unparsed {
        raw_text: String,
    },
    Failed {
        reason: String,
    },
}

impl ModelReply {
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            ModelReply::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

impl From<ModelReply> for GeneratedQuery {
    fn from(reply: ModelReply) -> Self {
        match reply {
            ModelReply::Parsed {
                query,
                explanation,
                confidence,
            } => GeneratedQuery {
                query,
                explanation,
                confidence,
            },
            ModelReply::Unparsed { raw_text } => GeneratedQuery {
                query: None,
                explanation: format!(
                    "I couldn't produce a structured query for that. The model replied: {}",
                    TextUtils::truncate_with_ellipsis(raw_text.trim(), MAX_RAW_REPLY_CHARS)
                ),
                confidence: Confidence::Low,
            },
            ModelReply::Failed { .. } => GeneratedQuery {
                query: None,
                explanation: "I'm having trouble reaching the language model right now. Please try again in a moment."
                    .to_string(),
                confidence: Confidence::Low,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawReply {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
}

/// Parse a model reply into a tagged result
pub fn parse_reply(raw: &str) -> ModelReply {
    for candidate in json_candidates(raw.trim()) {
        let Ok(reply) = serde_json::from_str::<RawReply>(candidate) else {
            continue;
        };
        if reply.query.is_none() && reply.explanation.is_none() {
            continue;
        }

        let query = reply
            .query
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());
        let explanation = reply
            .explanation
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| match query {
                Some(_) => "Here is the query I generated for your question.".to_string(),
                None => "I couldn't find a way to answer that from this database.".to_string(),
            });

        return ModelReply::Parsed {
            query,
            explanation,
            confidence: Confidence::from_label(reply.confidence.as_deref()),
        };
    }

    ModelReply::Unparsed {
        raw_text: raw.to_string(),
    }
}

/// Whole text, fenced block body, then the outermost `{...}` span
fn json_candidates(text: &str) -> Vec<&str> {
    let mut candidates = vec![text];

    if let Some(body) = fenced_body(text) {
        candidates.push(body);
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            candidates.push(&text[start..=end]);
        }
    }

    candidates
}

fn fenced_body(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    // Skip an info string such as `json`
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

/// Sends prompts to the model and parses what comes back
pub struct QueryGenerator {
    llm: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl QueryGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// One model call; transport errors and timeouts become `ModelReply::Failed`
    pub async fn request(&self, prompt: &Prompt) -> ModelReply {
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.timeout,
            self.llm.generate_text(&prompt.system_prompt, &prompt.user_prompt),
        )
        .await;
        crate::metrics::observe_generation(started.elapsed().as_secs_f64());

        match outcome {
            Ok(Ok(text)) => {
                let reply = parse_reply(&text);
                match reply {
                    ModelReply::Parsed { ref query, confidence, .. } => {
                        info!("Model reply parsed (query: {}, confidence: {})", query.is_some(), confidence);
                    }
                    _ => warn!("Model reply was not structured JSON ({} chars)", text.len()),
                }
                reply
            }
            Ok(Err(e)) => {
                warn!("Query generation failed: {}", e);
                ModelReply::Failed { reason: e.to_string() }
            }
            Err(_) => {
                warn!("Query generation timed out after {:?}", self.timeout);
                ModelReply::Failed {
                    reason: format!("timed out after {}s", self.timeout.as_secs()),
                }
            }
        }
    }

    pub async fn generate(&self, prompt: &Prompt) -> GeneratedQuery {
        let reply = self.request(prompt).await;
        debug!("Collapsing model reply into generated query");
        reply.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct MockLlm(anyhow::Result<String>);

    #[async_trait]
    impl TextGenerator for MockLlm {
        async fn generate_text(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }
    }

    struct SlowLlm;

    #[async_trait]
    impl TextGenerator for SlowLlm {
        async fn generate_text(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("{}".to_string())
        }
    }

    fn prompt() -> Prompt {
        Prompt {
            system_prompt: "sys".to_string(),
            user_prompt: "Show me all users".to_string(),
        }
    }

    fn generator(reply: anyhow::Result<String>) -> QueryGenerator {
        QueryGenerator::new(Arc::new(MockLlm(reply)), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_query_generation_success() {
        let reply = serde_json::json!({
            "query": "SELECT * FROM users LIMIT 10;",
            "explanation": "This query retrieves all users from the database.",
            "confidence": "high"
        })
        .to_string();

        let result = generator(Ok(reply)).generate(&prompt()).await;
        assert_eq!(result.query.as_deref(), Some("SELECT * FROM users LIMIT 10;"));
        assert_eq!(result.explanation, "This query retrieves all users from the database.");
        assert_eq!(result.confidence, Confidence::High);
    }

    #[tokio::test]
    async fn test_query_generation_invalid_json() {
        let result = generator(Ok("This is not valid JSON".to_string()))
            .generate(&prompt())
            .await;

        assert_eq!(result.query, None);
        assert!(result.explanation.contains("This is not valid JSON"));
        assert_eq!(result.confidence, Confidence::Low);
    }

    #[tokio::test]
    async fn test_transport_failure_degrades() {
        let gen = generator(Err(anyhow::anyhow!("connection refused")));
        let reply = gen.request(&prompt()).await;
        assert_eq!(reply.failure_reason(), Some("connection refused"));

        let result = GeneratedQuery::from(reply);
        assert_eq!(result.query, None);
        assert_eq!(result.confidence, Confidence::Low);
        assert!(!result.explanation.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_degrades() {
        let gen = QueryGenerator::new(Arc::new(SlowLlm), Duration::from_secs(2));
        let reply = gen.request(&prompt()).await;
        assert_eq!(reply.failure_reason(), Some("timed out after 2s"));
    }

    #[test]
    fn test_parse_fenced_reply() {
        let raw = "```json\n{\"query\": \"SELECT 1\", \"explanation\": \"one\", \"confidence\": \"medium\"}\n```";
        assert_eq!(
            parse_reply(raw),
            ModelReply::Parsed {
                query: Some("SELECT 1".to_string()),
                explanation: "one".to_string(),
                confidence: Confidence::Medium,
            }
        );
    }

    #[test]
    fn test_parse_json_embedded_in_prose() {
        let raw = "Sure! Here you go: {\"query\": \"SELECT name FROM users\", \"explanation\": \"names\", \"confidence\": \"HIGH\"} Hope that helps.";
        match parse_reply(raw) {
            ModelReply::Parsed { query, confidence, .. } => {
                assert_eq!(query.as_deref(), Some("SELECT name FROM users"));
                assert_eq!(confidence, Confidence::High);
            }
            other => panic!("expected parsed reply, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_null_query_and_unknown_confidence() {
        let raw = r#"{"query": null, "explanation": "There is no weather table.", "confidence": "certain"}"#;
        assert_eq!(
            parse_reply(raw),
            ModelReply::Parsed {
                query: None,
                explanation: "There is no weather table.".to_string(),
                confidence: Confidence::Low,
            }
        );
    }

    #[test]
    fn test_parse_blank_query_is_none() {
        let raw = r#"{"query": "   ", "explanation": "nothing to run"}"#;
        match parse_reply(raw) {
            ModelReply::Parsed { query, .. } => assert_eq!(query, None),
            other => panic!("expected parsed reply, got {:?}", other),
        }
    }

    #[test]
    fn test_unrelated_json_is_unparsed() {
        let raw = r#"{"answer": 42}"#;
        assert_eq!(
            parse_reply(raw),
            ModelReply::Unparsed {
                raw_text: raw.to_string()
            }
        );
    }

    #[test]
    fn test_long_unparsed_reply_is_truncated() {
        let raw = "x".repeat(2000);
        let generated = GeneratedQuery::from(ModelReply::Unparsed { raw_text: raw });
        assert!(generated.explanation.ends_with("..."));
        assert!(generated.explanation.len() < 700);
    }

    #[test]
    fn test_confidence_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Confidence::Medium).unwrap(), "\"medium\"");
        assert_eq!(Confidence::High.to_string(), "high");
    }
}
