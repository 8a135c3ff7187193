//! Few-shot example selection.
//!
//! Ranks stored examples against an incoming question by lexical overlap:
//! case-insensitive token-set intersection between the two questions. Ties go
//! to the more recently stored example.

use crate::domain::entities::Example;
use std::collections::HashSet;

pub const DEFAULT_K: usize = 4;

/// A stored example scored against the incoming question.
#[derive(Debug, Clone)]
pub struct ExampleMatch {
    pub example: Example,
    pub score: usize,
}

/// Return up to `k` examples ranked by descending overlap with `question`.
///
/// Examples arrive in store insertion order (oldest first). Equal scores are
/// broken in favor of the later entry. Zero-score entries stay eligible, so a
/// sparse store still contributes its most recent examples.
pub fn select_examples(question: &str, examples: &[Example], k: usize) -> Vec<ExampleMatch> {
    if examples.is_empty() || k == 0 {
        return Vec::new();
    }

    let question_tokens = tokenize(question);

    let mut matches: Vec<(usize, ExampleMatch)> = examples
        .iter()
        .enumerate()
        .map(|(index, example)| {
            let score = overlap_score(&question_tokens, &example.question);
            (
                index,
                ExampleMatch {
                    example: example.clone(),
                    score,
                },
            )
        })
        .collect();

    matches.sort_by(|(idx_a, a), (idx_b, b)| {
        b.score.cmp(&a.score).then_with(|| idx_b.cmp(idx_a))
    });

    matches.truncate(k);
    matches.into_iter().map(|(_, m)| m).collect()
}

fn overlap_score(question_tokens: &HashSet<String>, candidate: &str) -> usize {
    tokenize(candidate)
        .iter()
        .filter(|token| question_tokens.contains(*token))
        .count()
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_example(question: &str, sql: &str) -> Example {
        Example::new(question.to_string(), sql.to_string())
    }

    #[test]
    fn test_returns_at_most_k() {
        let examples = vec![
            create_example("count blocks", "SELECT COUNT(*) FROM blocks"),
            create_example("count transactions", "SELECT COUNT(*) FROM transactions"),
            create_example("count logs", "SELECT COUNT(*) FROM logs"),
        ];

        let matches = select_examples("count everything", &examples, 2);

        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn test_orders_by_overlap_desc() {
        let examples = vec![
            create_example("largest block by gas", "SELECT 1"),
            create_example("count transactions yesterday", "SELECT 2"),
        ];

        let matches = select_examples("count transactions today", &examples, 5);

        assert_eq!(matches[0].example.sql, "SELECT 2");
        assert!(matches[0].score > matches[1].score);
    }

    #[test]
    fn test_tie_broken_by_recency() {
        let examples = vec![
            create_example("daily transaction volume", "SELECT old"),
            create_example("daily transaction fees", "SELECT new"),
        ];

        // Both overlap on "daily transaction"; the later entry wins.
        let matches = select_examples("daily transaction count", &examples, 2);

        assert_eq!(matches[0].example.sql, "SELECT new");
        assert_eq!(matches[1].example.sql, "SELECT old");
        assert_eq!(matches[0].score, matches[1].score);
    }

    #[test]
    fn test_empty_store_returns_empty() {
        let matches = select_examples("count transactions yesterday", &[], 4);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_fewer_entries_than_k_returns_all() {
        let examples = vec![create_example("count blocks", "SELECT COUNT(*) FROM blocks")];

        let matches = select_examples("anything at all", &examples, 4);

        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_case_insensitive_and_punctuation_insensitive() {
        let examples = vec![create_example("Count Transactions", "SELECT 1")];

        let matches = select_examples("count transactions?", &examples, 1);

        assert_eq!(matches[0].score, 2);
    }
}
