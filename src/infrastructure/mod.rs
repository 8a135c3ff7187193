#[path = "config/mod.rs"]
pub mod config_mod;
pub use config_mod as config;
pub mod csv;
pub mod db;
pub mod example_store;
pub mod llm_clients;
pub mod schema;
