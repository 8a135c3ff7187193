//! SQL generation from a built prompt.
//!
//! Three stages: call the generation model, extract a single candidate
//! statement from whatever text came back, then validate it against the
//! read-only safety rules. Extraction and validation failures are normal
//! outcomes carried inside `GeneratedQuery`; only a model failure is an error.
//!
//! The keyword scan is deliberately shallow. It skips single-quoted string
//! literals and SQL comments, nothing more; the executor's read-only grant is
//! the actual security boundary.

use crate::domain::entities::{GeneratedQuery, RejectedReason, ValidationOutcome};
use crate::domain::error::Result;
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::llm_clients::LLMClient;
use crate::shared::token_counter;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{info, warn};

static CODE_FENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:sql|SQL)?\s*(.*?)```").unwrap());

/// Write/DDL keywords never allowed as top-level tokens.
const BANNED_KEYWORDS: [&str; 9] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "MERGE", "GRANT",
];

pub struct SqlGenerator {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    config: LLMConfig,
}

impl SqlGenerator {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>, config: LLMConfig) -> Self {
        Self { llm_client, config }
    }

    /// Run one generation attempt. Model failures propagate; everything the
    /// model actually said comes back inside the `GeneratedQuery`, including
    /// rejections.
    pub async fn generate(&self, prompt: &str) -> Result<GeneratedQuery> {
        info!(
            model = %self.config.model,
            prompt_tokens = token_counter::estimate_tokens(prompt),
            "Requesting SQL generation"
        );

        let raw = self.llm_client.generate(&self.config, "", prompt).await?;
        let generated = review_model_output(&raw);

        match &generated.validation_result {
            ValidationOutcome::Valid => {
                info!(sql_chars = generated.extracted_sql.len(), "Generated SQL passed validation");
            }
            ValidationOutcome::Rejected(reason) => {
                warn!(%reason, "Generated SQL rejected");
            }
        }

        Ok(generated)
    }
}

/// Extract and validate a statement from raw model text.
pub fn review_model_output(raw: &str) -> GeneratedQuery {
    match extract_sql(raw) {
        Some(sql) => {
            let validation_result = validate_statement(&sql);
            GeneratedQuery {
                raw_model_output: raw.to_string(),
                extracted_sql: sql,
                validation_result,
            }
        }
        None => GeneratedQuery {
            raw_model_output: raw.to_string(),
            extracted_sql: String::new(),
            validation_result: ValidationOutcome::Rejected(RejectedReason::NoStatementFound),
        },
    }
}

/// Pull one candidate statement out of raw model text.
///
/// Strips code fences, then cuts at the first semicolon outside a string
/// literal; a trailing terminator is kept, trailing explanation text is
/// discarded. Returns None when nothing remains.
pub fn extract_sql(raw: &str) -> Option<String> {
    let unfenced = strip_code_fences(raw);
    let statement = first_statement(&unfenced);
    let statement = statement.trim();
    if statement.is_empty() {
        None
    } else {
        Some(statement.to_string())
    }
}

/// Check one statement against the read-only safety rules.
pub fn validate_statement(sql: &str) -> ValidationOutcome {
    let sql_upper = sql.trim().to_uppercase();

    if !starts_with_word(&sql_upper, "SELECT") && !starts_with_word(&sql_upper, "WITH") {
        return ValidationOutcome::Rejected(RejectedReason::UnsafeStatement);
    }

    let scannable = mask_literals_and_comments(&sql_upper);
    for keyword in &BANNED_KEYWORDS {
        if contains_whole_word(&scannable, keyword) {
            return ValidationOutcome::Rejected(RejectedReason::UnsafeStatement);
        }
    }

    ValidationOutcome::Valid
}

fn strip_code_fences(raw: &str) -> String {
    if let Some(caps) = CODE_FENCE_PATTERN.captures(raw) {
        return caps[1].trim().to_string();
    }

    // Unpaired fence markers still get peeled off.
    let mut text = raw.trim();
    for prefix in ["```sql", "```SQL", "```"] {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest;
            break;
        }
    }
    text = text.strip_suffix("```").unwrap_or(text);
    text.trim().to_string()
}

/// Cut at the first semicolon outside a single-quoted literal, keeping it.
fn first_statement(text: &str) -> &str {
    let bytes = text.as_bytes();
    let mut in_string = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                if in_string && bytes.get(i + 1) == Some(&b'\'') {
                    i += 1; // escaped quote inside the literal
                } else {
                    in_string = !in_string;
                }
            }
            b';' if !in_string => {
                return &text[..=i];
            }
            _ => {}
        }
        i += 1;
    }

    text
}

/// Blank out single-quoted literals, `--` line comments and `/* */` block
/// comments so the keyword scan only sees real SQL tokens.
fn mask_literals_and_comments(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                out.push(b' ');
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\'' {
                        if bytes.get(i + 1) == Some(&b'\'') {
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
                out.push(b' ');
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
                out.push(b' ');
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    // Input was valid UTF-8 and multibyte sequences are copied through intact.
    String::from_utf8_lossy(&out).into_owned()
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn starts_with_word(text: &str, keyword: &str) -> bool {
    if !text.starts_with(keyword) {
        return false;
    }
    match text.as_bytes().get(keyword.len()) {
        Some(&next) => !is_word_byte(next),
        None => true,
    }
}

/// Whole-word keyword search so column names like CREATED_AT never match.
fn contains_whole_word(text: &str, keyword: &str) -> bool {
    let keyword_len = keyword.len();
    let text_len = text.len();

    if keyword_len > text_len {
        return false;
    }

    let text_bytes = text.as_bytes();
    let keyword_bytes = keyword.as_bytes();

    for i in 0..=(text_len - keyword_len) {
        if &text_bytes[i..i + keyword_len] == keyword_bytes {
            let before_ok = i == 0 || !is_word_byte(text_bytes[i - 1]);
            let after_ok =
                i + keyword_len == text_len || !is_word_byte(text_bytes[i + keyword_len]);

            if before_ok && after_ok {
                return true;
            }
        }
    }

    false
}
