use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A stored (question, SQL) pair shown to the generation model as guidance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub question: String,
    pub sql: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Example {
    pub fn new(question: String, sql: String) -> Self {
        Self {
            question,
            sql,
            tags: Vec::new(),
            created_at: Some(Utc::now()),
        }
    }
}

/// Trim plus case-fold, used solely for duplicate detection in the store.
pub fn normalize_question(question: &str) -> String {
    question.trim().to_lowercase()
}

/// Everything a single generation call needs. Built per question, never kept.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub question: String,
    pub schema: String,
    pub examples: Vec<Example>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectedReason {
    NoStatementFound,
    UnsafeStatement,
}

impl fmt::Display for RejectedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectedReason::NoStatementFound => {
                write!(f, "no SQL statement found in model output")
            }
            RejectedReason::UnsafeStatement => {
                write!(f, "statement failed read-only safety checks")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Valid,
    Rejected(RejectedReason),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }
}

/// One generation attempt. Lives for a single request; becomes an Example
/// only through the feedback path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub raw_model_output: String,
    pub extracted_sql: String,
    pub validation_result: ValidationOutcome,
}

/// Rows plus job metadata as reported by the query executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub columns: Vec<String>,
    pub rows: Vec<HashMap<String, serde_json::Value>>,
    pub row_count: usize,
    pub bytes_processed: u64,
    pub elapsed_ms: u64,
    pub cache_hit: bool,
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    Duplicate,
    Unsafe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordOutcome {
    Accepted,
    Skipped(SkipReason),
}

impl fmt::Display for RecordOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordOutcome::Accepted => write!(f, "accepted"),
            RecordOutcome::Skipped(SkipReason::Duplicate) => {
                write!(f, "skipped: identical example already stored")
            }
            RecordOutcome::Skipped(SkipReason::Unsafe) => {
                write!(f, "skipped: statement failed read-only safety checks")
            }
        }
    }
}
