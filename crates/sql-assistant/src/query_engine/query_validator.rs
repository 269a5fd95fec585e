//! Static safety checks for generated and user-supplied SQL
//!
//! This is allow-select-only, deny-by-keyword. It is not a SQL parser. Blocked keywords
//! are plain substrings, so `created_at` trips `CREATE`, and a keyword or `;` inside a
//! string literal or comment is rejected too. Over-rejecting is accepted in return for
//! never admitting a mutating statement.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::TextUtils;

lazy_static! {
    static ref SELECT_PREFIX: Regex = Regex::new(r"(?i)^\s*SELECT\b").unwrap();
}

pub const DEFAULT_MAX_QUERY_LENGTH: usize = 10_000;

pub const DEFAULT_BLOCKED_KEYWORDS: &[&str] =
    &["DROP", "DELETE", "TRUNCATE", "ALTER", "CREATE", "INSERT", "UPDATE"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub max_query_length: usize,
    /// Matched anywhere in the upper-cased query text
    pub blocked_keywords: Vec<String>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            blocked_keywords: DEFAULT_BLOCKED_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub is_safe: bool,
    pub reason: String,
}

impl ValidationVerdict {
    fn safe() -> Self {
        Self {
            is_safe: true,
            reason: "Query is safe".to_string(),
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            is_safe: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryValidator {
    policy: ValidationPolicy,
}

impl QueryValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        let blocked_keywords = policy
            .blocked_keywords
            .iter()
            .map(|k| k.trim().to_ascii_uppercase())
            .filter(|k| !k.is_empty())
            .collect();

        Self {
            policy: ValidationPolicy {
                max_query_length: policy.max_query_length,
                blocked_keywords,
            },
        }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Length, then single SELECT, then blocked keywords; first failure wins
    pub fn is_safe(&self, query: &str) -> ValidationVerdict {
        let verdict = self.check(query);
        debug!("Validation verdict: safe={} reason={}", verdict.is_safe, verdict.reason);
        verdict
    }

    fn check(&self, query: &str) -> ValidationVerdict {
        if query.chars().count() > self.policy.max_query_length {
            return ValidationVerdict::rejected(format!(
                "Query too long (max {} characters)",
                self.policy.max_query_length
            ));
        }

        let statement = single_statement_body(query);

        let shape_error = if !SELECT_PREFIX.is_match(statement) {
            Some("Only SELECT queries are allowed")
        } else if statement.contains(';') {
            Some("Multiple statements are not allowed")
        } else {
            None
        };

        let blocked = self.first_blocked_keyword(query);

        match (shape_error, blocked) {
            (Some(shape), Some(keyword)) => ValidationVerdict::rejected(format!(
                "{}: Dangerous keyword '{}' found",
                shape, keyword
            )),
            (Some(shape), None) => ValidationVerdict::rejected(shape),
            (None, Some(keyword)) => {
                ValidationVerdict::rejected(format!("Dangerous keyword '{}' found", keyword))
            }
            (None, None) => ValidationVerdict::safe(),
        }
    }

    fn first_blocked_keyword(&self, query: &str) -> Option<&str> {
        let query_upper = query.to_uppercase();
        self.policy
            .blocked_keywords
            .iter()
            .find(|keyword| query_upper.contains(keyword.as_str()))
            .map(String::as_str)
    }
}

/// Trimmed text with one optional trailing terminator removed
fn single_statement_body(query: &str) -> &str {
    let trimmed = query.trim();
    trimmed.strip_suffix(';').map(str::trim_end).unwrap_or(trimmed)
}

/// Canonical executable form of an accepted query.
///
/// Whitespace runs collapse to one space and the text ends in exactly one `;`.
pub fn sanitize(query: &str) -> String {
    let normalized = TextUtils::normalize_whitespace(query);
    let body = normalized.trim_end_matches(|c: char| c == ';' || c.is_whitespace());

    let mut sanitized = String::with_capacity(body.len() + 1);
    sanitized.push_str(body);
    sanitized.push(';');
    sanitized
}
