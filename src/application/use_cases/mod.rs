pub mod example_selector;
pub mod feedback_recorder;
pub mod prompt_builder;
pub mod query_pipeline;
pub mod result_summarizer;
pub mod sql_generator;
