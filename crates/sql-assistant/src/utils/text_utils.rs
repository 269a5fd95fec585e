//! Efficient text processing utilities

use std::borrow::Cow;
use regex::Regex;
use lazy_static::lazy_static;

lazy_static! {
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
}

/// Text helpers shared by the SQL validator, sanitizer and reply parser
pub struct TextUtils;

impl TextUtils {
    /// Collapse every whitespace run to a single space and trim both ends
    pub fn normalize_whitespace(text: &str) -> Cow<'_, str> {
        let needs_work = text.starts_with(char::is_whitespace)
            || text.ends_with(char::is_whitespace)
            || text.contains(|c: char| c.is_whitespace() && c != ' ')
            || text.contains("  ");

        if needs_work {
            Cow::Owned(WHITESPACE_REGEX.replace_all(text, " ").trim().to_string())
        } else {
            Cow::Borrowed(text)
        }
    }

    /// Truncate text to at most `max_chars` characters, ending with an ellipsis if cut.
    /// Always splits on a char boundary.
    pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> Cow<'_, str> {
        if text.chars().count() <= max_chars {
            return Cow::Borrowed(text);
        }
        if max_chars <= 3 {
            return Cow::Borrowed("...");
        }

        let mut result: String = text.chars().take(max_chars - 3).collect();
        result.push_str("...");
        Cow::Owned(result)
    }
}
