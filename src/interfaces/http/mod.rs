use crate::application::use_cases::feedback_recorder::FeedbackRecorder;
use crate::application::use_cases::query_pipeline::QueryPipeline;
use crate::domain::entities::{RecordOutcome, SkipReason};
use crate::domain::error::AppError;
use crate::infrastructure::example_store::ExampleStore;
use actix_cors::Cors;
use actix_web::{dev::Server, get, post, web, App, HttpResponse, HttpServer, Responder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use validator::Validate;

pub struct HttpState {
    pub pipeline: Arc<QueryPipeline>,
    pub recorder: Arc<FeedbackRecorder>,
    pub store: Arc<ExampleStore>,
    pub generation_model: String,
    pub summarization_model: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    #[validate(length(min = 1, max = 4096))]
    pub question: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FeedbackRequest {
    #[validate(length(min = 1, max = 4096))]
    pub question: String,
    #[validate(length(min = 1))]
    pub sql: String,
    #[serde(default)]
    pub accepted: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExportRequest {
    #[validate(length(min = 1))]
    pub sql: String,
}

#[derive(Serialize)]
pub struct FeedbackResponse {
    pub outcome: String,
    pub message: String,
}

impl FeedbackResponse {
    fn ignored() -> Self {
        Self {
            outcome: "ignored".to_string(),
            message: "feedback was not marked accepted; nothing recorded".to_string(),
        }
    }

    fn from_record(outcome: &RecordOutcome) -> Self {
        let (outcome, message) = match outcome {
            RecordOutcome::Accepted => ("accepted", "example stored for future prompts"),
            RecordOutcome::Skipped(SkipReason::Duplicate) => {
                ("skipped", "identical example already stored")
            }
            RecordOutcome::Skipped(SkipReason::Unsafe) => {
                ("skipped", "statement failed read-only safety checks")
            }
        };
        Self {
            outcome: outcome.to_string(),
            message: message.to_string(),
        }
    }
}

/// Map step errors onto HTTP statuses: upstream capabilities gone bad are
/// gateway failures, bad input is unprocessable, the rest is internal.
fn error_response(err: &AppError) -> HttpResponse {
    match err {
        AppError::ValidationError(_) => HttpResponse::UnprocessableEntity().body(err.to_string()),
        AppError::ModelError(_) | AppError::SummarizationError(_) | AppError::ExecutionError(_) => {
            HttpResponse::BadGateway().body(err.to_string())
        }
        _ => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[post("/ask")]
async fn ask(data: web::Data<HttpState>, req: web::Json<AskRequest>) -> impl Responder {
    if let Err(e) = req.validate() {
        return HttpResponse::UnprocessableEntity().body(e.to_string());
    }

    info!(question = %req.question, "Ask received");
    match data.pipeline.ask(&req.question).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => {
            error!("Ask failed: {}", e);
            error_response(&e)
        }
    }
}

#[post("/feedback")]
async fn feedback(data: web::Data<HttpState>, req: web::Json<FeedbackRequest>) -> impl Responder {
    if let Err(e) = req.validate() {
        return HttpResponse::UnprocessableEntity().body(e.to_string());
    }

    if !req.accepted {
        return HttpResponse::Ok().json(FeedbackResponse::ignored());
    }

    match data.recorder.record(&req.question, &req.sql).await {
        Ok(outcome) => HttpResponse::Ok().json(FeedbackResponse::from_record(&outcome)),
        Err(e) => {
            error!("Feedback recording failed: {}", e);
            error_response(&e)
        }
    }
}

#[get("/examples")]
async fn list_examples(data: web::Data<HttpState>) -> impl Responder {
    match data.store.load() {
        Ok(examples) => HttpResponse::Ok().json(examples),
        Err(e) => {
            error!("Failed to load examples: {}", e);
            error_response(&e)
        }
    }
}

#[post("/export")]
async fn export(data: web::Data<HttpState>, req: web::Json<ExportRequest>) -> impl Responder {
    if let Err(e) = req.validate() {
        return HttpResponse::UnprocessableEntity().body(e.to_string());
    }

    match data.pipeline.export_csv(&req.sql).await {
        Ok(csv) => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .insert_header(("Content-Disposition", "attachment; filename=\"result.csv\""))
            .body(csv),
        Err(e) => {
            error!("Export failed: {}", e);
            error_response(&e)
        }
    }
}

#[get("/health")]
async fn health(data: web::Data<HttpState>) -> impl Responder {
    let example_count = data.store.load().map(|v| v.len()).unwrap_or(0);
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "generation_model": data.generation_model,
        "summarization_model": data.summarization_model,
        "schema_fingerprint": data.pipeline.schema_fingerprint(),
        "executor_configured": data.pipeline.has_executor(),
        "example_count": example_count,
    }))
}

pub fn start_server(state: HttpState, host: &str, port: u16) -> std::io::Result<Server> {
    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        let cors = Cors::permissive(); // Allow all origins for local tool

        App::new().wrap(cors).app_data(state.clone()).service(
            web::scope("/api")
                .service(ask)
                .service(feedback)
                .service(list_examples)
                .service(export)
                .service(health),
        )
    })
    .bind((host, port))?
    .run();

    Ok(server)
}
