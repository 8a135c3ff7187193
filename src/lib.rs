pub mod app;
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod shared;

pub use application::use_cases::query_pipeline::{AskOutcome, QueryPipeline};
pub use domain::error::{AppError, Result};
