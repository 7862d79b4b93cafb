use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, ensure};
use clap::Parser;
use reqwest::Url;

/// Public AniList GraphQL endpoint.
pub const DEFAULT_UPSTREAM_ENDPOINT: &str = "https://graphql.anilist.co";
/// AniList rejects page sizes above 50.
pub const MAX_PER_PAGE: u32 = 50;
pub const DEFAULT_PER_PAGE: u32 = MAX_PER_PAGE;
pub const DEFAULT_MAX_PAGES: u32 = 100;

/// CLI / env configuration parsed at process startup.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "anisearch-backend",
    about = "Aggregating search proxy for the AniList GraphQL API",
    version,
    disable_help_subcommand = true
)]
struct CliConfig {
    /// Address to bind the HTTP server to (e.g., 0.0.0.0:8080)
    #[arg(long, env = "ANISEARCH_BIND_ADDR", default_value = "0.0.0.0:8080")]
    listen_addr: SocketAddr,

    /// GraphQL endpoint queried for media search results
    #[arg(long, env = "ANISEARCH_UPSTREAM_ENDPOINT", default_value = DEFAULT_UPSTREAM_ENDPOINT)]
    upstream_endpoint: String,

    /// Number of media requested per upstream page (1-50)
    #[arg(long, env = "ANISEARCH_PER_PAGE", default_value_t = DEFAULT_PER_PAGE)]
    per_page: u32,

    /// Upper bound on upstream pages fetched for a single search
    #[arg(long, env = "ANISEARCH_MAX_PAGES", default_value_t = DEFAULT_MAX_PAGES)]
    max_pages: u32,

    /// Optional OTLP endpoint (grpc or http/proto) for OpenTelemetry export
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otel_endpoint: Option<String>,

    /// Logical service name for telemetry (resource attribute)
    #[arg(long, env = "OTEL_SERVICE_NAME", default_value = "anisearch-backend")]
    otel_service_name: String,

    /// Disable OTLP trace export even if an endpoint is set
    #[arg(long, env = "ANISEARCH_OTEL_DISABLE_TRACES", default_value_t = false)]
    otel_disable_traces: bool,

    /// Disable OTLP log export even if an endpoint is set
    #[arg(long, env = "ANISEARCH_OTEL_DISABLE_LOGS", default_value_t = false)]
    otel_disable_logs: bool,

    /// Deployment environment tag for telemetry (e.g., development, staging, prod)
    #[arg(long, env = "ANISEARCH_ENV", default_value = "development")]
    environment: String,

    /// Default log filter when RUST_LOG is not provided
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Comma-separated list of allowed CORS origins
    #[arg(long, env = "ANISEARCH_CORS_ALLOWED_ORIGINS", value_delimiter = ',')]
    cors_allowed_origins: Vec<String>,

    /// Directory containing the built frontend assets
    #[arg(long, env = "ANISEARCH_FRONTEND_DIST_DIR")]
    frontend_dist_dir: Option<PathBuf>,
}

/// Fully validated configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub upstream: UpstreamConfig,
    pub otel: OtelConfig,
    pub log: LogConfig,
    pub environment: String,
    pub cors_allowed_origins: Vec<String>,
    pub frontend_dist_dir: Option<PathBuf>,
}

/// Settings for the GraphQL service searches are forwarded to.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub endpoint: Url,
    pub per_page: u32,
    pub max_pages: u32,
}

/// OpenTelemetry exporter configuration.
#[derive(Debug, Clone)]
pub struct OtelConfig {
    pub endpoint: Option<String>,
    pub service_name: String,
    pub disable_traces: bool,
    pub disable_logs: bool,
}

/// Structured logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
}

impl AppConfig {
    /// Parse CLI/env arguments and return a validated configuration.
    pub fn load() -> Result<Self> {
        let cli = CliConfig::parse();
        Self::try_from(cli)
    }
}

impl UpstreamConfig {
    /// Validate raw upstream settings.
    pub fn new(endpoint: &str, per_page: u32, max_pages: u32) -> Result<Self> {
        let endpoint = parse_endpoint(endpoint)
            .with_context(|| format!("invalid upstream endpoint '{endpoint}'"))?;
        ensure!(
            (1..=MAX_PER_PAGE).contains(&per_page),
            "per-page must be between 1 and {MAX_PER_PAGE}, got {per_page}"
        );
        ensure!(max_pages >= 1, "max-pages must be at least 1");

        Ok(Self {
            endpoint,
            per_page,
            max_pages,
        })
    }
}

impl TryFrom<CliConfig> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(value: CliConfig) -> Result<Self> {
        let upstream =
            UpstreamConfig::new(&value.upstream_endpoint, value.per_page, value.max_pages)?;

        let frontend_dist_dir = value.frontend_dist_dir.clone();
        if let Some(dir) = &frontend_dist_dir {
            ensure_directory_exists(dir)
                .with_context(|| format!("frontend dist directory '{}' missing", dir.display()))?;
        }

        Ok(Self {
            listen_addr: value.listen_addr,
            upstream,
            environment: value.environment,
            otel: OtelConfig {
                endpoint: value.otel_endpoint,
                service_name: value.otel_service_name,
                disable_traces: value.otel_disable_traces,
                disable_logs: value.otel_disable_logs,
            },
            log: LogConfig {
                level: value.log_level,
            },
            cors_allowed_origins: value
                .cors_allowed_origins
                .into_iter()
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            frontend_dist_dir,
        })
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!("unsupported scheme '{other}', expected http or https")),
    }
}

fn ensure_directory_exists(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    Err(anyhow!(
        "path '{}' does not exist or is not a directory",
        path.display()
    ))
}
