use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{MatchedPath, State},
    http::{
        HeaderValue, Method,
        header::{ACCEPT, CONTENT_TYPE},
    },
    middleware,
    routing::get,
};
use serde::Serialize;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::{MakeSpan, OnRequest, OnResponse, TraceLayer},
};
use tracing::{Span, field, instrument};

use crate::{
    api::{self, ApiResult},
    config::AppConfig,
    upstream::AniListClient,
};

/// Shared application state cloned into each request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub upstream: AniListClient,
    pub boot_instant: Instant,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>) -> Result<Self> {
        let upstream =
            AniListClient::new(&config.upstream).context("failed to build upstream http client")?;
        Ok(Self {
            config,
            upstream,
            boot_instant: Instant::now(),
        })
    }
}

/// Build the Axum router with shared layers and routes.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);
    let frontend_dist_dir = state.config.frontend_dist_dir.clone();

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/search", get(api::search::anime_search))
        .with_state(state);

    // Unknown paths fall through to the frontend bundle when one is configured.
    let router = match frontend_dist_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.fallback(api::fallback_handler),
    };

    router
        .layer(middleware::from_fn(api::ensure_error_envelope))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(HttpMakeSpan)
                .on_request(LogOnRequest)
                .on_response(LogOnResponse),
        )
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET])
        .allow_headers([ACCEPT, CONTENT_TYPE])
}

/// JSON payload returned by `/healthz`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    upstream_endpoint: String,
    per_page: u32,
    max_pages: u32,
    uptime_seconds: f64,
}

#[instrument(skip(state))]
async fn healthz(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    Ok(Json(HealthResponse {
        status: "ok",
        upstream_endpoint: state.upstream.endpoint().to_string(),
        per_page: state.upstream.per_page(),
        max_pages: state.config.upstream.max_pages,
        uptime_seconds: state.boot_instant.elapsed().as_secs_f64(),
    }))
}

#[derive(Clone)]
struct HttpMakeSpan;

impl<B> MakeSpan<B> for HttpMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let method = request.method().clone();
        let matched_path = request
            .extensions()
            .get::<MatchedPath>()
            .map(|path| path.as_str())
            .unwrap_or_else(|| request.uri().path());

        let span = tracing::info_span!(
            "http_request",
            http.request.method = %method,
            http.route = %matched_path,
            url.path = request.uri().path(),
            url.query = field::Empty,
            http.response.status_code = field::Empty,
            http.latency_ms = field::Empty
        );

        if let Some(query) = request.uri().query() {
            span.record("url.query", field::display(query));
        }

        span
    }
}

#[derive(Clone)]
struct LogOnRequest;

impl<B> OnRequest<B> for LogOnRequest {
    fn on_request(&mut self, request: &axum::http::Request<B>, span: &Span) {
        tracing::info!(
            parent: span,
            "HTTP request received: {} {}",
            request.method(),
            request.uri().path()
        );
    }
}

#[derive(Clone)]
struct LogOnResponse;

impl<B> OnResponse<B> for LogOnResponse {
    fn on_response(self, response: &axum::http::Response<B>, latency: Duration, span: &Span) {
        let status_code = response.status().as_u16();

        span.record("http.response.status_code", field::display(status_code));
        span.record("http.latency_ms", field::display(latency.as_millis()));

        tracing::info!(
            parent: span,
            "HTTP request completed with status {} in {} ms",
            status_code,
            latency.as_millis()
        );
    }
}
