//! HTTP API for the chat front end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/`, `/chat` | Answer a question (see [`ChatRequest`]) |
//! | `POST` | `/feedback` | Record feedback on an answer |
//! | `GET`  | `/health` | Liveness plus index readiness |
//! | `GET`  | `/listings/{kind}` | Raw records for `jobs`, `events`, `mentorship` or `schemes` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400, also for malformed bodies), `not_found`
//! (404), `configuration` (500), `storage` (500), `source_unavailable` (500),
//! `dependency` (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser front end
//! can be served from anywhere.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::chat::{AppContext, ChatRequest, ChatResponse, ListingKind};
use crate::error::AshaError;
use crate::feedback::FeedbackRequest;

/// Build the router over a shared [`AppContext`].
pub fn router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", post(handle_chat))
        .route("/chat", post(handle_chat))
        .route("/feedback", post(handle_feedback))
        .route("/health", get(handle_health))
        .route("/listings/{kind}", get(handle_listings))
        .layer(cors)
        .with_state(ctx)
}

/// Warm the index, then serve on `[server].bind` until the process exits.
///
/// A failed warm-up is logged and retried lazily by the first request.
pub async fn run_server(ctx: Arc<AppContext>) -> anyhow::Result<()> {
    let bind_addr = ctx.config.server.bind.clone();

    match ctx.knowledge.ensure_ready().await {
        Ok(index) => tracing::info!(entries = index.len(), "index ready"),
        Err(e) => tracing::warn!(error = %e, "index warm-up failed; will retry on first request"),
    }

    let app = router(ctx);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "asha server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Pipeline(AshaError),
}

impl From<AshaError> for AppError {
    fn from(e: AshaError) -> Self {
        AppError::Pipeline(e)
    }
}

/// Malformed or mistyped request bodies keep the JSON error contract.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Pipeline(AshaError::Configuration(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration")
            }
            AppError::Pipeline(AshaError::SourceUnavailable { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "source_unavailable")
            }
            AppError::Pipeline(AshaError::Dependency { .. }) => {
                (StatusCode::BAD_GATEWAY, "dependency")
            }
            AppError::Pipeline(AshaError::Storage(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match self {
            AppError::BadRequest(m) | AppError::NotFound(m) => m,
            AppError::Pipeline(e) => e.to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

// ============ POST / and /chat ============

async fn handle_chat(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = payload?;
    if request.query.trim().is_empty() {
        return Err(AppError::BadRequest("query must not be empty".to_string()));
    }
    Ok(Json(ctx.answer(request).await?))
}

// ============ POST /feedback ============

#[derive(Serialize)]
struct FeedbackResponse {
    status: &'static str,
    message: &'static str,
}

async fn handle_feedback(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let Json(request) = payload?;
    ctx.feedback.record(&request).await.map_err(|e| {
        tracing::error!(error = %e, "error recording feedback");
        e
    })?;
    Ok(Json(FeedbackResponse {
        status: "success",
        message: "Feedback recorded successfully",
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    /// Seconds since the Unix epoch.
    timestamp: f64,
    index_ready: bool,
}

async fn handle_health(State(ctx): State<Arc<AppContext>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        index_ready: ctx.knowledge.is_ready().await,
    })
}

// ============ GET /listings/{kind} ============

async fn handle_listings(
    State(ctx): State<Arc<AppContext>>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<Value>>, AppError> {
    let kind = ListingKind::parse(&kind)
        .ok_or_else(|| AppError::NotFound(format!("unknown listing kind: {}", kind)))?;
    Ok(Json(ctx.listings(kind)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;

    #[test]
    fn test_error_mapping() {
        let dep = AppError::from(AshaError::dependency(
            "gemini",
            Stage::ModelCall,
            anyhow::anyhow!("boom"),
        ));
        assert_eq!(dep.status_and_code(), (StatusCode::BAD_GATEWAY, "dependency"));

        let cfg = AppError::from(AshaError::configuration("no index"));
        assert_eq!(
            cfg.status_and_code(),
            (StatusCode::INTERNAL_SERVER_ERROR, "configuration")
        );

        let bad = AppError::BadRequest("empty".to_string());
        assert_eq!(bad.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
