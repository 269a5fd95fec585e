//! Renders schema metadata and session history into a generation request

use std::fmt::Write;

use crate::database::{ColumnInfo, SchemaMetadata};
use crate::memory::ConversationTurn;

/// The two halves of a generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system_prompt: String,
    pub user_prompt: String,
}

const SYSTEM_PREAMBLE: &str = "\
You are an expert SQL assistant. You translate questions about a relational database \
into a single read-only SQL query and explain what the query does.";

const SYSTEM_RULES: &str = "\
Rules:
1. Generate exactly one SELECT statement. Never modify data or schema.
2. Only use the tables and columns listed above.
3. Add a LIMIT clause when a question could return many rows.
4. If the question cannot be answered from this schema, set \"query\" to null and explain why.

Respond with a JSON object and nothing else:
{\"query\": \"<SQL or null>\", \"explanation\": \"<plain-language answer>\", \"confidence\": \"high|medium|low\"}";

/// Stateless prompt renderer
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(
        &self,
        schema: &SchemaMetadata,
        history: &[ConversationTurn],
        user_message: &str,
    ) -> Prompt {
        Prompt {
            system_prompt: self.system_prompt(schema),
            user_prompt: self.user_prompt(history, user_message),
        }
    }

    /// Preamble, every table with its columns, relationships, then the reply contract
    pub fn system_prompt(&self, schema: &SchemaMetadata) -> String {
        let mut prompt = String::with_capacity(512);
        prompt.push_str(SYSTEM_PREAMBLE);
        prompt.push_str("\n\nDatabase schema:\n");

        for table in &schema.tables {
            let _ = writeln!(prompt, "\nTable: {}", table.name);
            for column in &table.columns {
                let _ = writeln!(prompt, "  - {}", describe_column(column));
            }
        }

        if !schema.relationships.is_empty() {
            prompt.push_str("\nRelationships:\n");
            for rel in &schema.relationships {
                let _ = writeln!(
                    prompt,
                    "  - {}.{} → {}.{}",
                    rel.from_table, rel.from_column, rel.to_table, rel.to_column
                );
            }
        }

        prompt.push('\n');
        prompt.push_str(SYSTEM_RULES);
        prompt
    }

    /// Earlier turns as alternating user/assistant lines, then the new question
    pub fn user_prompt(&self, history: &[ConversationTurn], user_message: &str) -> String {
        let mut prompt = String::new();

        if !history.is_empty() {
            prompt.push_str("Previous conversation:\n");
            for turn in history {
                let _ = writeln!(prompt, "User: {}", turn.user_message);
                match turn.query {
                    Some(ref query) => {
                        let _ = writeln!(prompt, "Assistant: {} [SQL: {}]", turn.bot_response, query);
                    }
                    None => {
                        let _ = writeln!(prompt, "Assistant: {}", turn.bot_response);
                    }
                }
            }
            prompt.push('\n');
        }

        let _ = write!(prompt, "Current question: {}", user_message);
        prompt
    }
}

/// `name (type[, NOT NULL][, default=X])`
fn describe_column(column: &ColumnInfo) -> String {
    let mut desc = format!("{} ({}", column.name, column.data_type);
    if !column.nullable {
        desc.push_str(", NOT NULL");
    }
    if let Some(ref default) = column.default {
        let _ = write!(desc, ", default={}", default);
    }
    desc.push(')');
    desc
}
