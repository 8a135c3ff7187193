//! Prompt assembly for SQL generation.
//!
//! Sections appear in fixed order: instruction preamble, schema, few-shot
//! examples, then the user question. The whole prompt is held under a
//! character budget; the schema is truncated first, then examples are dropped
//! from the low-scored tail. The question is never cut.

use crate::domain::entities::{Example, GenerationRequest};
use std::fmt::Write;

pub const DEFAULT_MAX_PROMPT_CHARS: usize = 24_000;

/// Schema text kept even under the tightest budget.
const MIN_SCHEMA_CHARS: usize = 512;

const SCHEMA_TRUNCATION_MARKER: &str = "\n[schema truncated]";

pub struct PromptBuilder {
    max_prompt_chars: usize,
}

impl PromptBuilder {
    pub fn new(max_prompt_chars: usize) -> Self {
        Self { max_prompt_chars }
    }

    /// Build the generation prompt. Deterministic for identical inputs.
    ///
    /// `request.examples` must be ordered best match first; when the budget
    /// forces drops, the tail goes first.
    pub fn build(&self, request: &GenerationRequest) -> String {
        let mut examples: Vec<&Example> = request.examples.iter().collect();

        loop {
            let skeleton = self.assemble(&request.question, "", &examples);
            let schema_room = self.max_prompt_chars.saturating_sub(skeleton.len());
            let schema = fit_schema(&request.schema, schema_room);
            let prompt = self.assemble(&request.question, &schema, &examples);

            if prompt.len() <= self.max_prompt_chars || examples.is_empty() {
                return prompt;
            }
            examples.pop();
        }
    }

    fn assemble(&self, question: &str, schema: &str, examples: &[&Example]) -> String {
        let mut prompt = String::new();

        writeln!(
            prompt,
            "You are a data analyst assistant. Produce exactly one read-only SQL statement \
             answering the question, using only the given schema."
        )
        .unwrap();
        writeln!(prompt).unwrap();
        writeln!(prompt, "Rules:").unwrap();
        writeln!(
            prompt,
            "- Return only the SQL query text, with no markdown fences and no commentary."
        )
        .unwrap();
        writeln!(
            prompt,
            "- The statement must be a SELECT (or WITH ... SELECT); never modify data."
        )
        .unwrap();
        writeln!(prompt, "- Give every selected expression an explicit alias.").unwrap();
        writeln!(
            prompt,
            "- If the question names no date range, assume the most recent period that makes sense."
        )
        .unwrap();
        writeln!(prompt).unwrap();

        writeln!(prompt, "## Schema\n").unwrap();
        writeln!(prompt, "{}", schema).unwrap();

        if !examples.is_empty() {
            writeln!(prompt, "## Examples\n").unwrap();
            for (idx, example) in examples.iter().enumerate() {
                self.add_example(&mut prompt, idx + 1, example);
            }
        }

        writeln!(prompt, "## Task").unwrap();
        writeln!(prompt, "Write one SQL query answering: {}", question).unwrap();

        prompt
    }

    fn add_example(&self, prompt: &mut String, idx: usize, example: &Example) {
        writeln!(prompt, "### Example {}", idx).unwrap();
        writeln!(prompt, "**Question:** {}", example.question).unwrap();
        writeln!(prompt, "**SQL:** {}", example.sql).unwrap();
        if !example.tags.is_empty() {
            writeln!(prompt, "**Tags:** {}", example.tags.join(", ")).unwrap();
        }
        writeln!(prompt).unwrap();
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PROMPT_CHARS)
    }
}

fn fit_schema(schema: &str, room: usize) -> String {
    if schema.len() <= room {
        return schema.to_string();
    }
    let keep = room
        .saturating_sub(SCHEMA_TRUNCATION_MARKER.len())
        .max(MIN_SCHEMA_CHARS);
    let mut cut = keep.min(schema.len());
    while cut > 0 && !schema.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &schema[..cut], SCHEMA_TRUNCATION_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request(question: &str, schema: &str, examples: Vec<Example>) -> GenerationRequest {
        GenerationRequest {
            question: question.to_string(),
            schema: schema.to_string(),
            examples,
        }
    }

    fn create_example(question: &str, sql: &str) -> Example {
        Example::new(question.to_string(), sql.to_string())
    }

    #[test]
    fn test_sections_in_fixed_order() {
        let builder = PromptBuilder::default();
        let request = create_request(
            "count transactions yesterday",
            "transactions: hash, block_date, value",
            vec![create_example("count blocks", "SELECT COUNT(*) AS n FROM blocks")],
        );

        let prompt = builder.build(&request);

        let schema_pos = prompt.find("## Schema").unwrap();
        let examples_pos = prompt.find("## Examples").unwrap();
        let task_pos = prompt.find("## Task").unwrap();
        assert!(schema_pos < examples_pos);
        assert!(examples_pos < task_pos);
        assert!(prompt.contains("count transactions yesterday"));
    }

    #[test]
    fn test_zero_examples_omits_examples_section() {
        let builder = PromptBuilder::default();
        let request = create_request("count transactions", "transactions: hash", vec![]);

        let prompt = builder.build(&request);

        assert!(!prompt.contains("## Examples"));
        assert!(prompt.contains("## Schema"));
        assert!(prompt.contains("## Task"));
    }

    #[test]
    fn test_deterministic() {
        let builder = PromptBuilder::default();
        let request = create_request(
            "top accounts by balance",
            "accounts: address, balance",
            vec![create_example("count blocks", "SELECT COUNT(*) AS n FROM blocks")],
        );

        assert_eq!(builder.build(&request), builder.build(&request));
    }

    #[test]
    fn test_schema_truncated_before_examples_dropped() {
        let builder = PromptBuilder::new(2000);
        let request = create_request(
            "count transactions",
            &"c".repeat(5000),
            vec![
                create_example("count blocks", "SELECT COUNT(*) AS n FROM blocks"),
                create_example("count logs", "SELECT COUNT(*) AS n FROM logs"),
            ],
        );

        let prompt = builder.build(&request);

        assert!(prompt.len() <= 2000);
        assert!(prompt.contains("[schema truncated]"));
        assert!(prompt.contains("### Example 1"));
        assert!(prompt.contains("### Example 2"));
    }

    #[test]
    fn test_examples_dropped_from_tail_when_budget_tight() {
        let builder = PromptBuilder::new(1400);
        let request = create_request(
            "count transactions",
            &"c".repeat(5000),
            vec![
                create_example("best match", "SELECT 1 AS kept"),
                create_example("worst match", &format!("SELECT '{}' AS dropped", "x".repeat(600))),
            ],
        );

        let prompt = builder.build(&request);

        assert!(prompt.contains("best match"));
        assert!(!prompt.contains("worst match"));
    }

    #[test]
    fn test_question_never_truncated() {
        let builder = PromptBuilder::new(600);
        let question = format!("list {} transactions", "very ".repeat(300));
        let request = create_request(&question, &"c".repeat(5000), vec![]);

        let prompt = builder.build(&request);

        assert!(prompt.contains(&question));
    }

    #[test]
    fn test_small_inputs_pass_through_verbatim() {
        let builder = PromptBuilder::default();
        let schema = "blocks: number, timestamp, gas_used";
        let request = create_request("latest block", schema, vec![]);

        let prompt = builder.build(&request);

        assert!(prompt.contains(schema));
        assert!(!prompt.contains("[schema truncated]"));
    }
}
