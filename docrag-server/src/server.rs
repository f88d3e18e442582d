use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::{
    Form, Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Query, State, multipart::MultipartError,
        rejection::FormRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use docrag::{DocumentFormat, IndexResult, RagError, RagPipeline};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::{
    config::Settings,
    protocol::{
        AnswerResponse, ErrorResponse, HealthResponse, PdfUploadResponse, QueryForm, QueryParams,
        QueryResponse, UploadResponse, WELCOME_MESSAGE, WelcomeResponse,
    },
    upload::{sanitize_filename, save_upload},
};

#[derive(Clone, Debug)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: Arc<RagPipeline>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            pipeline,
            upload_dir: upload_dir.into(),
            max_upload_bytes: Settings::default().max_upload_bytes,
        }
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }
}

/// An error response: a status code and a `{"error": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<MultipartError> for ApiError {
    /// Keeps the rejection's own status, e.g. 413 when the body limit is hit.
    fn from(err: MultipartError) -> Self {
        Self { status: err.status(), message: err.body_text() }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        if err.is_client_error() {
            Self::bad_request(err.to_string())
        } else {
            error!(error = %err, "request failed");
            Self::internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/upload-pdf/", post(upload_pdf))
        .route("/query", post(query_form))
        .route("/query/", get(query_params))
        .with_state(state)
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let pipeline = settings.build_pipeline().context("failed to build the pipeline")?;
    let state = AppState::new(Arc::new(pipeline), settings.upload_dir.clone())
        .with_max_upload_bytes(settings.max_upload_bytes);
    let app = app_router(state);
    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .with_context(|| "invalid host/port for docrag server")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        index_dir = %settings.index_dir.display(),
        corpus_mode = ?settings.corpus_mode,
        "docrag listening on http://{}",
        addr
    );
    axum::serve(listener, app).await?;
    Ok(())
}

async fn welcome() -> impl IntoResponse {
    Json(WelcomeResponse { message: WELCOME_MESSAGE.to_string() })
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "docrag".to_string(),
        indexed_chunks: state.pipeline.corpus_size().await,
    })
}

async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let (filename, result) = receive_and_index(&state, multipart, None).await?;
    Ok(Json(UploadResponse {
        status: "success".to_string(),
        message: format!("{filename} uploaded and indexed."),
        chunks: result.chunk_count,
    }))
}

async fn upload_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PdfUploadResponse>, ApiError> {
    let (filename, _) = receive_and_index(&state, multipart, Some(DocumentFormat::Pdf)).await?;
    Ok(Json(PdfUploadResponse {
        status: "PDF processed".to_string(),
        message: format!("{filename} uploaded and indexed."),
        tables: Vec::new(),
    }))
}

async fn query_form(
    State(state): State<AppState>,
    form: Result<Form<QueryForm>, FormRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Form(form) = form.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let query = require_query(form.query)?;
    let result = state.pipeline.answer(&query).await;
    Ok(Json(QueryResponse { query, response: result.answer, status: result.status }))
}

async fn query_params(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let query = require_query(params.q)?;
    let result = state.pipeline.answer(&query).await;
    Ok(Json(AnswerResponse { answer: result.answer, query, status: result.status }))
}

fn require_query(query: String) -> Result<String, ApiError> {
    if query.trim().is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }
    Ok(query)
}

/// Read the `file` field, keep a copy in the upload directory, then index it.
async fn receive_and_index(
    state: &AppState,
    mut multipart: Multipart,
    required: Option<DocumentFormat>,
) -> Result<(String, IndexResult), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .and_then(sanitize_filename)
            .ok_or_else(|| ApiError::bad_request("uploaded file has no usable name"))?;
        let format = DocumentFormat::from_filename(&filename)?;
        if let Some(required) = required.filter(|required| *required != format) {
            return Err(ApiError::bad_request(format!("expected a {required} file")));
        }

        let bytes = field.bytes().await?;
        save_upload(&state.upload_dir, &filename, &bytes).await.map_err(|e| {
            error!(error = %e, file = %filename, "failed to store upload");
            ApiError::internal(format!("failed to store {filename}: {e}"))
        })?;

        let result = state.pipeline.index_document(&bytes, &filename).await?;
        info!(
            file = %filename,
            chunks = result.chunk_count,
            corpus_size = result.corpus_size,
            "document indexed"
        );
        return Ok((filename, result));
    }

    Err(ApiError::bad_request("missing multipart field 'file'"))
}
