pub mod entities;
pub mod error;
pub mod llm_config;
