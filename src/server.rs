//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/upload-transcript` | Multipart `file` (PDF) → completed, available courses |
//! | `POST` | `/api/chat` | `{"query": ...}` → `{"response": ...}` |
//! | `GET`  | `/api/health` | Health check |
//! | `GET`  | `/api/departments` | Departments present in the catalog |
//! | `GET`  | `/api/courses/{code}` | One course and its offerings, case-insensitive code |
//!
//! # Error Contract
//!
//! Every error response is a flat object with a human-readable message:
//!
//! ```json
//! { "error": "Invalid file" }
//! ```
//!
//! Validation failures are 400, unknown courses 404, and failures of the
//! partition, embedding, index or language-model services 500.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser frontend
//! can be served from a different origin.

use anyhow::Context;
use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::advisor::Advisor;
use crate::availability::AvailabilityResolver;
use crate::catalog::Catalog;
use crate::chat::{create_index, create_model, ChatService};
use crate::config::Config;
use crate::course_codes::CourseCodeMatcher;
use crate::embedding::create_embedder;
use crate::models::{CourseDetail, TranscriptReport};
use crate::partition::create_partitioner;
use crate::prereq::PrerequisiteMatcher;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub advisor: Arc<Advisor>,
    pub chat: Arc<ChatService>,
}

impl AppState {
    pub fn new(advisor: Advisor, chat: ChatService) -> Self {
        Self {
            advisor: Arc::new(advisor),
            chat: Arc::new(chat),
        }
    }

    /// Load the catalog and construct every configured client.
    ///
    /// Fails when the catalog cannot be loaded or a provider is missing its
    /// API key, so a misconfigured server never starts.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let catalog = Catalog::load(&config.catalog.path).with_context(|| {
            format!("failed to load catalog {}", config.catalog.path.display())
        })?;
        let embedder = create_embedder(&config.embedding)?;

        let matcher = PrerequisiteMatcher::with_threshold(
            embedder.clone(),
            config.advisor.similarity_threshold,
        );
        let resolver = AvailabilityResolver::with_limit(matcher, config.advisor.max_results);
        let mut advisor = Advisor::new(
            Arc::new(catalog),
            create_partitioner(&config.partition)?,
            resolver,
        );
        if let Some(departments) = &config.advisor.departments {
            advisor = advisor.with_course_codes(CourseCodeMatcher::new(departments));
        }

        let chat = ChatService::new(
            embedder,
            create_index(&config.retrieval)?,
            create_model(&config.llm)?,
        )
        .with_top_k(config.retrieval.top_k);

        Ok(Self::new(advisor, chat))
    }
}

/// Starts the HTTP server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    info!(
        courses = state.advisor.catalog().len(),
        "Catalog loaded"
    );

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    serve(listener, build_router(state, config.server.max_upload_bytes)).await
}

/// Serve `app` on an already-bound listener.
pub async fn serve(listener: TcpListener, app: Router) -> anyhow::Result<()> {
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/upload-transcript", post(handle_upload_transcript))
        .route("/api/chat", post(handle_chat))
        .route("/api/health", get(handle_health))
        .route("/api/departments", get(handle_departments))
        .route("/api/courses/{code}", get(handle_course))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

// ============ Error handling ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// An error response carrying its HTTP status and message.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        message: message.into(),
    }
}

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

// ============ POST /api/upload-transcript ============

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    #[serde(flatten)]
    report: TranscriptReport,
}

fn is_pdf_filename(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}

async fn handle_upload_transcript(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart.map_err(|_| bad_request("No file provided"))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError {
            status: e.status(),
            message: e.body_text(),
        })?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(bad_request("No selected file"));
        }
        if !is_pdf_filename(&filename) {
            return Err(bad_request("Invalid file"));
        }
        let bytes = field.bytes().await.map_err(|e| AppError {
            status: e.status(),
            message: e.body_text(),
        })?;
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(bad_request("No file provided"));
    };
    info!(file = %filename, bytes = bytes.len(), "Transcript uploaded");

    let report = state.advisor.analyze(bytes.to_vec()).await.map_err(|e| {
        error!(file = %filename, "Transcript processing failed: {:#}", e);
        internal_error(format!("{e:#}"))
    })?;

    Ok(Json(UploadResponse {
        success: true,
        report,
    }))
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    query: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let query = body
        .ok()
        .and_then(|Json(req)| req.query)
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| bad_request("Query is required"))?;

    let response = state.chat.answer(&query).await.map_err(|e| {
        error!("Chat request failed: {:#}", e);
        internal_error(format!("Error processing chat request: {e:#}"))
    })?;

    Ok(Json(ChatResponse { response }))
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

// ============ Catalog browsing ============

#[derive(Serialize)]
struct DepartmentsResponse {
    departments: Vec<String>,
}

async fn handle_departments(State(state): State<AppState>) -> Json<DepartmentsResponse> {
    Json(DepartmentsResponse {
        departments: state.advisor.catalog().departments(),
    })
}

async fn handle_course(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<CourseDetail>, AppError> {
    state
        .advisor
        .catalog()
        .detail(&code)
        .map(Json)
        .ok_or_else(|| not_found("Course not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use std::io::Write;

    fn config_with_catalog(csv: &str) -> (tempfile::NamedTempFile, Config) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(csv.as_bytes()).unwrap();
        let text = format!(
            "[server]\nbind = \"127.0.0.1:0\"\n\n[catalog]\npath = {:?}\n",
            file.path().display().to_string()
        );
        let config = parse_config(&text).unwrap();
        (file, config)
    }

    #[test]
    fn state_loads_catalog_from_config() {
        let (_file, config) = config_with_catalog(
            "course,coursetitle,units,instructor,avgGPA,A\n\
             CMPSC 16,Problem Solving I,4,CONRAD P T,3.1,60\n",
        );
        let Ok(state) = AppState::from_config(&config) else {
            panic!("valid catalog should load");
        };
        assert_eq!(state.advisor.catalog().len(), 1);
        let detail = state.advisor.catalog().detail("cmpsc 16").unwrap();
        assert_eq!(detail.offerings.len(), 1);
        assert_eq!(detail.offerings[0].grades.a, 60);
    }

    #[test]
    fn invalid_catalog_fails_state_construction() {
        let (_file, config) = config_with_catalog("course,units\nCMPSC 16,-1\n");
        let Some(err) = AppState::from_config(&config).err() else {
            panic!("negative units should be rejected");
        };
        let message = format!("{err:#}");
        assert!(message.contains("failed to load catalog"));
        assert!(message.contains("invalid units value '-1'"));
    }

    #[test]
    fn missing_catalog_fails_state_construction() {
        let dir = tempfile::tempdir().unwrap();
        let text = format!(
            "[server]\nbind = \"127.0.0.1:0\"\n\n[catalog]\npath = {:?}\n",
            dir.path().join("absent.csv").display().to_string()
        );
        let config = parse_config(&text).unwrap();
        assert!(AppState::from_config(&config).is_err());
    }

    #[test]
    fn pdf_extension_is_case_insensitive() {
        assert!(is_pdf_filename("transcript.pdf"));
        assert!(is_pdf_filename("Transcript.PDF"));
        assert!(!is_pdf_filename("transcript.txt"));
        assert!(!is_pdf_filename("pdf"));
        assert!(!is_pdf_filename("transcript.pdf.txt"));
    }

    #[test]
    fn upload_response_is_flat() {
        let body = serde_json::to_value(UploadResponse {
            success: true,
            report: TranscriptReport {
                completed_courses: vec!["CMPSC 16".into()],
                available_courses: vec![],
            },
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "success": true,
                "completed_courses": ["CMPSC 16"],
                "available_courses": []
            })
        );
    }

    #[test]
    fn errors_serialize_as_flat_message() {
        let body = serde_json::to_value(ErrorBody {
            error: "Invalid file".into(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "error": "Invalid file" }));
    }
}
