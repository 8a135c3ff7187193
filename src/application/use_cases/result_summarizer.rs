//! Turns an execution result into a short prose answer.
//!
//! Empty results short-circuit to a fixed message and never touch the model.
//! Non-empty results are rendered into a bounded preview so huge result sets
//! cannot blow up the summarization prompt.

use crate::domain::entities::ExecutionResult;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::llm_clients::LLMClient;
use crate::shared::token_counter;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;

pub const EMPTY_RESULT_MESSAGE: &str = "The query returned no results.";

const MAX_PREVIEW_ROWS: usize = 50;
const MAX_PREVIEW_CHARS: usize = 8000;

pub struct ResultSummarizer {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    config: LLMConfig,
}

impl ResultSummarizer {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>, config: LLMConfig) -> Self {
        Self { llm_client, config }
    }

    /// Summarize rows for the user. `row_count == 0` returns the fixed
    /// message without a model call.
    pub async fn summarize(
        &self,
        question: &str,
        sql: &str,
        result: &ExecutionResult,
    ) -> Result<String> {
        if result.row_count == 0 {
            info!("Query returned no rows, skipping summarization call");
            return Ok(EMPTY_RESULT_MESSAGE.to_string());
        }

        let prompt = build_summary_prompt(question, sql, result);
        info!(
            model = %self.config.model,
            row_count = result.row_count,
            prompt_tokens = token_counter::estimate_tokens(&prompt),
            "Requesting result summarization"
        );

        self.llm_client
            .generate(&self.config, "", &prompt)
            .await
            .map(|summary| summary.trim().to_string())
            .map_err(|err| match err {
                AppError::ModelError(msg) => AppError::SummarizationError(msg),
                other => other,
            })
    }
}

fn build_summary_prompt(question: &str, sql: &str, result: &ExecutionResult) -> String {
    let mut prompt = String::new();

    writeln!(
        prompt,
        "You are a data analyst assistant. Summarize a SQL query result for the user."
    )
    .unwrap();
    writeln!(prompt).unwrap();
    writeln!(prompt, "Rules:").unwrap();
    writeln!(prompt, "1. No introduction sentence; answer directly.").unwrap();
    writeln!(
        prompt,
        "2. Be specific and mention concrete numbers from the result."
    )
    .unwrap();
    writeln!(prompt, "3. Do not speculate beyond the rows shown.").unwrap();
    writeln!(
        prompt,
        "4. If the question named no date period, state which period was assumed."
    )
    .unwrap();
    writeln!(prompt).unwrap();
    writeln!(prompt, "## Question").unwrap();
    writeln!(prompt, "{}", question).unwrap();
    writeln!(prompt).unwrap();
    writeln!(prompt, "## SQL").unwrap();
    writeln!(prompt, "{}", sql).unwrap();
    writeln!(prompt).unwrap();
    writeln!(prompt, "## Result").unwrap();
    writeln!(prompt, "{}", render_preview(result)).unwrap();

    prompt
}

/// Render rows as pipe-separated lines, bounded to `MAX_PREVIEW_ROWS` rows
/// and `MAX_PREVIEW_CHARS` characters. A truncated preview states the true
/// total row count.
pub fn render_preview(result: &ExecutionResult) -> String {
    let mut preview = String::new();
    writeln!(preview, "{}", result.columns.join(" | ")).unwrap();

    let mut rows_shown = 0;
    for row in result.rows.iter().take(MAX_PREVIEW_ROWS) {
        let line = result
            .columns
            .iter()
            .map(|column| render_value(row.get(column)))
            .collect::<Vec<_>>()
            .join(" | ");

        if preview.len() + line.len() + 1 > MAX_PREVIEW_CHARS {
            break;
        }
        writeln!(preview, "{}", line).unwrap();
        rows_shown += 1;
    }

    if rows_shown < result.row_count {
        writeln!(
            preview,
            "(showing first {} of {} rows)",
            rows_shown, result.row_count
        )
        .unwrap();
    }

    preview
}

fn render_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => "NULL".to_string(),
        Some(other) => other.to_string(),
    }
}
