//! End-to-end question answering.
//!
//! One ask runs strictly in sequence: load store, select examples, build the
//! prompt, generate SQL, execute, summarize. Each later stage can fail on its
//! own; a failure never discards what earlier stages already produced. Only a
//! generation-model failure aborts the ask, because without it there is
//! nothing to report.

use crate::application::use_cases::example_selector::select_examples;
use crate::application::use_cases::prompt_builder::PromptBuilder;
use crate::application::use_cases::result_summarizer::ResultSummarizer;
use crate::application::use_cases::sql_generator::{
    extract_sql, validate_statement, SqlGenerator,
};
use crate::domain::entities::{
    Example, ExecutionResult, GenerationRequest, ValidationOutcome,
};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::csv::render_csv;
use crate::infrastructure::db::QueryExecutor;
use crate::infrastructure::example_store::ExampleStore;
use crate::infrastructure::schema::SchemaDescription;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything one ask produced. Optional fields fill in as stages succeed;
/// per-stage errors land in their `_error` field instead of erasing earlier
/// results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskOutcome {
    pub question: String,
    pub examples_used: usize,
    pub sql: Option<String>,
    pub rejected_reason: Option<String>,
    pub raw_model_output: Option<String>,
    pub execution: Option<ExecutionResult>,
    pub execution_error: Option<String>,
    pub summary: Option<String>,
    pub summarization_error: Option<String>,
}

impl AskOutcome {
    fn new(question: &str, examples_used: usize) -> Self {
        Self {
            question: question.to_string(),
            examples_used,
            sql: None,
            rejected_reason: None,
            raw_model_output: None,
            execution: None,
            execution_error: None,
            summary: None,
            summarization_error: None,
        }
    }
}

pub struct QueryPipeline {
    store: Arc<ExampleStore>,
    schema: SchemaDescription,
    prompt_builder: PromptBuilder,
    generator: SqlGenerator,
    summarizer: ResultSummarizer,
    executor: Option<Arc<dyn QueryExecutor + Send + Sync>>,
    examples_k: usize,
}

impl QueryPipeline {
    pub fn new(
        store: Arc<ExampleStore>,
        schema: SchemaDescription,
        prompt_builder: PromptBuilder,
        generator: SqlGenerator,
        summarizer: ResultSummarizer,
        executor: Option<Arc<dyn QueryExecutor + Send + Sync>>,
        examples_k: usize,
    ) -> Self {
        Self {
            store,
            schema,
            prompt_builder,
            generator,
            summarizer,
            executor,
            examples_k,
        }
    }

    pub async fn ask(&self, question: &str) -> Result<AskOutcome> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::ValidationError(
                "Question must not be empty".to_string(),
            ));
        }

        // Fresh read per request; an unreadable store degrades to zero-shot.
        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "Example store unavailable, proceeding zero-shot");
                Vec::new()
            }
        };

        let matches = select_examples(question, &stored, self.examples_k);
        info!(
            available = stored.len(),
            selected = matches.len(),
            "Selected few-shot examples"
        );

        let examples: Vec<Example> = matches
            .iter()
            .map(|matched| matched.example.clone())
            .collect();
        let request = GenerationRequest {
            question: question.to_string(),
            schema: self.schema.text.clone(),
            examples,
        };
        let prompt = self.prompt_builder.build(&request);

        let generated = self.generator.generate(&prompt).await?;

        let mut outcome = AskOutcome::new(question, matches.len());
        let sql = match &generated.validation_result {
            ValidationOutcome::Valid => generated.extracted_sql.clone(),
            ValidationOutcome::Rejected(reason) => {
                outcome.rejected_reason = Some(reason.to_string());
                outcome.raw_model_output = Some(generated.raw_model_output.clone());
                return Ok(outcome);
            }
        };
        outcome.sql = Some(sql.clone());

        let executor = match &self.executor {
            Some(executor) => executor,
            None => {
                info!("No warehouse connection configured, returning SQL without execution");
                return Ok(outcome);
            }
        };

        let execution = match executor.execute(&sql).await {
            Ok(execution) => execution,
            Err(err) => {
                warn!(error = %err, "Query execution failed, returning SQL only");
                outcome.execution_error = Some(err.to_string());
                return Ok(outcome);
            }
        };

        match self.summarizer.summarize(question, &sql, &execution).await {
            Ok(summary) => outcome.summary = Some(summary),
            Err(err) => {
                warn!(error = %err, "Summarization failed, returning rows without summary");
                outcome.summarization_error = Some(err.to_string());
            }
        }
        outcome.execution = Some(execution);

        Ok(outcome)
    }

    /// Re-validate and execute a statement, rendering the rows as CSV.
    pub async fn export_csv(&self, sql: &str) -> Result<String> {
        let statement = extract_sql(sql)
            .ok_or_else(|| AppError::ValidationError("No SQL statement provided".to_string()))?;

        if !validate_statement(&statement).is_valid() {
            return Err(AppError::ValidationError(
                "Statement failed read-only safety checks".to_string(),
            ));
        }

        let executor = self.executor.as_ref().ok_or_else(|| {
            AppError::ExecutionError("No warehouse connection configured".to_string())
        })?;

        let result = executor.execute(&statement).await?;
        render_csv(&result)
    }

    pub fn schema_fingerprint(&self) -> &str {
        &self.schema.fingerprint
    }

    pub fn has_executor(&self) -> bool {
        self.executor.is_some()
    }
}
