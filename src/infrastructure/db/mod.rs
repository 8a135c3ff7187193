pub mod executor;

pub use executor::{ExecutorConfig, PostgresExecutor, QueryExecutor};
