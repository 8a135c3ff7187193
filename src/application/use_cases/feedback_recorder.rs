//! Records accepted (question, SQL) pairs back into the example store.
//!
//! The SQL is re-validated before it is persisted, so the store can never
//! hold a statement that would fail the read-only safety checks, no matter
//! what the caller submits.

use crate::application::use_cases::sql_generator::{extract_sql, validate_statement};
use crate::domain::entities::{RecordOutcome, SkipReason};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::example_store::ExampleStore;
use std::sync::Arc;
use tracing::{info, warn};

pub struct FeedbackRecorder {
    store: Arc<ExampleStore>,
}

impl FeedbackRecorder {
    pub fn new(store: Arc<ExampleStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, question: &str, sql: &str) -> Result<RecordOutcome> {
        if question.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Question must not be empty".to_string(),
            ));
        }

        let statement = match extract_sql(sql) {
            Some(statement) => statement,
            None => {
                warn!("Feedback carried no SQL statement, skipping");
                return Ok(RecordOutcome::Skipped(SkipReason::Unsafe));
            }
        };

        if !validate_statement(&statement).is_valid() {
            warn!("Feedback SQL failed safety checks, skipping");
            return Ok(RecordOutcome::Skipped(SkipReason::Unsafe));
        }

        let outcome = self.store.upsert(question, &statement).await?;
        info!(%outcome, "Feedback recorded");
        Ok(outcome)
    }
}
