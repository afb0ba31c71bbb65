//! HTTP routes.
//!
//! - `GET /health` - liveness check
//! - `GET /{app_id}` - cached reviews for an app, as a JSON array. The `x-cache`
//!   header says whether they came from a snapshot (`hit`) or were just fetched (`miss`).

use axum::{
  extract::{Path, State},
  http::{header::HeaderName, StatusCode},
  response::{IntoResponse, Response},
  routing::get,
  Json, Router,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::cache::{is_app_id, ReviewCache};
use crate::error::CacheError;

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

pub fn router(cache: ReviewCache) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/{app_id}", get(get_reviews))
    .with_state(cache)
}

async fn health() -> &'static str {
  "ok"
}

async fn get_reviews(
  State(cache): State<ReviewCache>,
  Path(app_id): Path<String>,
) -> Result<Response, ApiError> {
  if !is_app_id(&app_id) {
    return Err(ApiError::bad_request(format!("invalid app id {:?}", app_id)));
  }

  info!(app_id, "Handling review request");
  let result = cache.get_reviews(&app_id).await?;

  Ok(([(X_CACHE, result.source.as_str())], Json(result.data)).into_response())
}

/// Error response body: `{"code": "...", "message": "..."}`.
#[derive(Debug, Serialize)]
pub struct ApiError {
  #[serde(skip)]
  status: StatusCode,
  code: &'static str,
  message: String,
}

impl ApiError {
  fn bad_request(message: String) -> Self {
    Self {
      status: StatusCode::BAD_REQUEST,
      code: "INVALID_APP_ID",
      message,
    }
  }
}

impl From<CacheError> for ApiError {
  fn from(err: CacheError) -> Self {
    match err {
      CacheError::FetchFailed { .. } => {
        warn!(error = %err, "Upstream fetch failed");
        Self {
          status: StatusCode::FAILED_DEPENDENCY,
          code: "DEPENDENCY_FAILED",
          message: format!("Failed to fetch app reviews: {}", err),
        }
      }
      _ => {
        error!(error = %err, "Failed to serve reviews");
        Self {
          status: StatusCode::INTERNAL_SERVER_ERROR,
          code: "INTERNAL_ERROR",
          message: "Internal error".to_string(),
        }
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.status, Json(self)).into_response()
  }
}
