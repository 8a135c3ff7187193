// ============================================================
// CSV INFRASTRUCTURE LAYER
// ============================================================
// Render execution results as downloadable CSV

use crate::domain::entities::ExecutionResult;
use crate::domain::error::{AppError, Result};
use csv::WriterBuilder;
use serde_json::Value;

fn render_err(msg: impl Into<String>) -> AppError {
    AppError::Internal(msg.into())
}

/// Render an execution result as CSV text, header row first. Cell order
/// follows `result.columns`; NULL renders as an empty cell.
pub fn render_csv(result: &ExecutionResult) -> Result<String> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer
        .write_record(&result.columns)
        .map_err(|e| render_err(format!("Failed to write CSV header: {}", e)))?;

    for row in &result.rows {
        let record: Vec<String> = result
            .columns
            .iter()
            .map(|column| render_field(row.get(column)))
            .collect();
        writer
            .write_record(&record)
            .map_err(|e| render_err(format!("Failed to write CSV row: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| render_err(format!("Failed to flush CSV output: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| render_err(format!("CSV output was not UTF-8: {}", e)))
}

fn render_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn create_result() -> ExecutionResult {
        let mut first = HashMap::new();
        first.insert("city".to_string(), Value::String("Jakarta, ID".to_string()));
        first.insert("total".to_string(), Value::from(42));

        let mut second = HashMap::new();
        second.insert("city".to_string(), Value::String("Bandung".to_string()));
        second.insert("total".to_string(), Value::Null);

        ExecutionResult {
            columns: vec!["city".to_string(), "total".to_string()],
            rows: vec![first, second],
            row_count: 2,
            bytes_processed: 0,
            elapsed_ms: 0,
            cache_hit: false,
            job_id: None,
        }
    }

    #[test]
    fn test_renders_header_then_rows_in_column_order() {
        let csv = render_csv(&create_result()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "city,total");
        assert_eq!(lines[1], "\"Jakarta, ID\",42");
        assert_eq!(lines[2], "Bandung,");
    }

    #[test]
    fn test_empty_result_is_header_only() {
        let mut result = create_result();
        result.rows.clear();
        result.row_count = 0;

        let csv = render_csv(&result).unwrap();

        assert_eq!(csv.trim_end(), "city,total");
    }
}
