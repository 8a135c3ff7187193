pub mod use_cases;

pub use use_cases::feedback_recorder::FeedbackRecorder;
pub use use_cases::query_pipeline::{AskOutcome, QueryPipeline};
pub use use_cases::result_summarizer::ResultSummarizer;
pub use use_cases::sql_generator::SqlGenerator;
