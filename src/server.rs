//! HTTP surface: the axum router, the upload handler, and error responses.
//!
//! | Route | Method | Body |
//! |-------|--------|------|
//! | `/api/parse-document` | POST | multipart, field `file` |
//! | `/api/health` | GET | none |
//!
//! Every error is a JSON object `{"error": "<message>"}`. Status codes come
//! from [`ParseError`]: request problems are 400, model failures 502, and
//! everything else 500.

use crate::error::ParseError;
use crate::output::AggregateResult;
use crate::parse::DocumentParser;
use crate::pipeline::intake::Upload;
use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// Multipart field carrying the document.
pub const UPLOAD_FIELD: &str = "file";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub parser: Arc<DocumentParser>,
}

impl AppState {
    pub fn new(parser: DocumentParser) -> Self {
        Self {
            parser: Arc::new(parser),
        }
    }
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.parser.config().max_upload_bytes;
    Router::new()
        .route("/api/parse-document", post(parse_document))
        .route("/api/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn parse_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AggregateResult>, AppError> {
    // A body that is not multipart at all carries no file.
    let multipart = multipart.map_err(|rejection| {
        warn!("Rejected non-multipart upload: {}", rejection);
        ParseError::NoFileUploaded
    })?;

    let upload = read_upload(multipart).await?;
    let result = state.parser.parse(upload).await?;
    Ok(Json(result))
}

/// Pull the first `file` part that carries a filename out of the body.
///
/// Parts without a filename are form values, not uploads, and are skipped.
/// A body that yields no part at all (empty or without a single boundary)
/// carries no file; a stream that breaks after a part has started, or that
/// runs past the body limit, is an invalid upload.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, ParseError> {
    let mut seen_part = false;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) if !seen_part && e.status() != StatusCode::PAYLOAD_TOO_LARGE => {
                warn!("Multipart body has no readable part: {}", e.body_text());
                return Err(ParseError::NoFileUploaded);
            }
            Err(e) => {
                return Err(ParseError::InvalidUpload {
                    detail: e.body_text(),
                })
            }
        };
        seen_part = true;

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_owned) else {
            continue;
        };
        if filename.is_empty() {
            return Err(ParseError::EmptyFilename);
        }

        let bytes = field.bytes().await.map_err(|e| ParseError::InvalidUpload {
            detail: e.body_text(),
        })?;
        return Ok(Upload::new(filename, bytes.to_vec()));
    }
    Err(ParseError::NoFileUploaded)
}

/// [`ParseError`] rendered as an HTTP response.
pub struct AppError(pub ParseError);

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        AppError(err)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            ParseError::ModelCall { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {:?}", self.0);
        } else if let ParseError::Rasterization(cause) = &self.0 {
            warn!("Rasterization failed: {}", cause);
        }

        let body = Json(json!({
            "error": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}
