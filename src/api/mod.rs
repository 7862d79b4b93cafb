use axum::{
    Json,
    body::{Body, Bytes},
    http::{HeaderValue, Request, StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{services::search::SearchError, upstream::FetchError};

pub mod search;

/// Client-visible message for every unexpected failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Result alias for JSON payloads that map API errors automatically.
pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Error envelope returned to HTTP clients: `{"error": "..."}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Canonical API error that converts into the shared JSON envelope, or into
/// the upstream's own body when relaying an upstream failure.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    #[source]
    source: Option<anyhow::Error>,
    status: StatusCode,
    message: String,
    passthrough: Option<Bytes>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            source: None,
            status,
            message: message.into(),
            passthrough: None,
        }
    }

    /// Build a validation/parameter error (HTTP 400).
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Build a resource-not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Build a method-not-allowed error (HTTP 405).
    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, message)
    }

    /// Build an internal server error that logs the provided source.
    pub fn internal_with_source(err: impl Into<anyhow::Error>) -> Self {
        Self {
            source: Some(err.into()),
            ..Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
        }
    }

    /// Relay an upstream failure: its status and its JSON body, untouched.
    pub fn upstream(status: StatusCode, body: Bytes) -> Self {
        Self {
            passthrough: Some(body),
            ..Self::new(status, format!("upstream responded with status {status}"))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError {
            source,
            status,
            message,
            passthrough,
        } = self;

        if status.is_server_error() {
            if let Some(err) = &source {
                tracing::error!(
                    error = ?err,
                    status = %status,
                    message = message.as_str(),
                    "api error (critical)"
                );
            } else {
                tracing::error!(
                    status = %status,
                    message = message.as_str(),
                    "api error (critical)"
                );
            }
        } else {
            tracing::warn!(status = %status, message = message.as_str(), "api error");
        }

        let mut response = match passthrough {
            Some(body) => {
                let mut response = (status, Body::from(body)).into_response();
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                response
            }
            None => (status, Json(ErrorResponse { error: message })).into_response(),
        };
        response
            .extensions_mut()
            .insert(ErrorEnvelopeApplied::default());
        response
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Fetch {
                source: FetchError::Status { status, body },
                ..
            } => Self::upstream(status, body),
            other => {
                tracing::debug!(kind = other.kind(), "search failed");
                Self::internal_with_source(other)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct ErrorEnvelopeApplied;

/// Middleware that rewrites Axum default errors into the shared envelope.
pub async fn ensure_error_envelope(req: Request<Body>, next: Next) -> Response {
    let response = next.run(req).await;
    let status = response.status();

    if (status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_FOUND)
        && response
            .extensions()
            .get::<ErrorEnvelopeApplied>()
            .is_none()
    {
        return match status {
            StatusCode::METHOD_NOT_ALLOWED => {
                ApiError::method_not_allowed("method not allowed").into_response()
            }
            StatusCode::NOT_FOUND => ApiError::not_found("route not found").into_response(),
            _ => unreachable!(),
        };
    }

    response
}

/// Fallback handler ensuring unknown routes return the API envelope.
pub async fn fallback_handler() -> ApiError {
    ApiError::not_found("route not found")
}
