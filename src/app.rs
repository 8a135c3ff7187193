use crate::application::use_cases::feedback_recorder::FeedbackRecorder;
use crate::application::use_cases::prompt_builder::PromptBuilder;
use crate::application::use_cases::query_pipeline::QueryPipeline;
use crate::application::use_cases::result_summarizer::ResultSummarizer;
use crate::application::use_cases::sql_generator::SqlGenerator;
use crate::domain::error::AppError;
use crate::infrastructure::config::load_config;
use crate::infrastructure::db::{PostgresExecutor, QueryExecutor};
use crate::infrastructure::example_store::ExampleStore;
use crate::infrastructure::llm_clients::gemini::GeminiClient;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::schema::load_schema;
use crate::interfaces::http::{start_server, HttpState};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config = load_config().map_err(to_io_err)?;
    let schema = load_schema(Path::new(&config.prompt.schema_path)).map_err(to_io_err)?;

    let store = Arc::new(ExampleStore::new(&config.store.path));
    let llm_client: Arc<dyn LLMClient + Send + Sync> = Arc::new(GeminiClient::new());

    let executor: Option<Arc<dyn QueryExecutor + Send + Sync>> = match &config.database.url {
        Some(url) => match PostgresExecutor::connect(url, config.executor()).await {
            Ok(executor) => Some(Arc::new(executor)),
            Err(err) => {
                warn!(error = %err, "Warehouse unreachable, continuing in generation-only mode");
                None
            }
        },
        None => {
            info!("No database URL configured, running in generation-only mode");
            None
        }
    };

    let pipeline = Arc::new(QueryPipeline::new(
        store.clone(),
        schema,
        PromptBuilder::new(config.prompt.max_chars),
        SqlGenerator::new(llm_client.clone(), config.generation_llm()),
        ResultSummarizer::new(llm_client, config.summarization_llm()),
        executor,
        config.prompt.examples_k,
    ));
    let recorder = Arc::new(FeedbackRecorder::new(store.clone()));

    info!(host = %config.server.host, port = config.server.port, "Starting server");
    let server = start_server(
        HttpState {
            pipeline,
            recorder,
            store,
            generation_model: config.llm.generation_model.clone(),
            summarization_model: config.llm.summarization_model.clone(),
        },
        &config.server.host,
        config.server.port,
    )?;
    server.await
}

fn to_io_err(err: AppError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}
