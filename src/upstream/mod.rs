//! Client for the AniList GraphQL search endpoint.

mod model;

use axum::body::Bytes;
use reqwest::{StatusCode, Url, header::ACCEPT};
use serde_json::Value;
use thiserror::Error;
use tracing::{Span, field, instrument};

use crate::{config::UpstreamConfig, services::search::PageSource};

pub use model::{CoverImage, MediaItem, MediaPage, MediaTitle, PageInfo};
use model::{GraphQlEnvelope, GraphQlRequest, SearchVariables};

/// Anime search document. `isAdult: false` narrows results upstream and the
/// `isAdult` field is requested back so pages can be filtered locally too.
pub const SEARCH_DOCUMENT: &str = r#"
query ($search: String, $page: Int, $perPage: Int) {
  Page(page: $page, perPage: $perPage) {
    pageInfo {
      total
      currentPage
      lastPage
      hasNextPage
    }
    media(search: $search, type: ANIME, isAdult: false) {
      id
      title {
        romaji
        english
        native
      }
      description
      episodes
      genres
      coverImage {
        extraLarge
        large
        medium
        color
      }
      isAdult
    }
  }
}
"#;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Failure while fetching or decoding a single upstream page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-2xx answer carrying a JSON body, relayed to the caller as-is.
    #[error("upstream responded with status {status}")]
    Status { status: StatusCode, body: Bytes },

    #[error("upstream request failed")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned malformed json")]
    Decode(#[from] serde_json::Error),

    #[error("upstream response did not match the expected schema: {0}")]
    SchemaMismatch(String),
}

impl FetchError {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Status { .. } => "upstream_status",
            FetchError::Transport(_) => "transport",
            FetchError::Decode(_) => "decode",
            FetchError::SchemaMismatch(_) => "schema_mismatch",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AniListClient {
    http: reqwest::Client,
    endpoint: Url,
    per_page: u32,
}

impl AniListClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            per_page: config.per_page,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// POST the search document for one page and decode the answer.
    #[instrument(
        name = "upstream_page",
        skip(self, search),
        fields(
            url.full = %self.endpoint,
            http.response.status_code = field::Empty
        )
    )]
    pub async fn fetch_page(&self, search: &str, page: u32) -> Result<MediaPage, FetchError> {
        let request = GraphQlRequest {
            query: SEARCH_DOCUMENT,
            variables: SearchVariables {
                search,
                page,
                per_page: self.per_page,
            },
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        Span::current().record("http.response.status_code", field::display(status.as_u16()));

        let body = response.bytes().await?;
        decode_page(status, body)
    }
}

impl PageSource for AniListClient {
    async fn fetch_page(&self, search: &str, page: u32) -> Result<MediaPage, FetchError> {
        AniListClient::fetch_page(self, search, page).await
    }
}

/// Turn a raw upstream answer into a page. The body must be JSON whatever the
/// status; error statuses keep the original bytes for passthrough.
fn decode_page(status: StatusCode, body: Bytes) -> Result<MediaPage, FetchError> {
    let value: Value = serde_json::from_slice(&body)?;

    if !status.is_success() {
        return Err(FetchError::Status { status, body });
    }

    let envelope: GraphQlEnvelope = serde_json::from_value(value)
        .map_err(|err| FetchError::SchemaMismatch(err.to_string()))?;

    match envelope.data {
        Some(data) => Ok(data.page),
        None if envelope.errors.is_empty() => {
            Err(FetchError::SchemaMismatch("response has no data".into()))
        }
        None => {
            let messages: Vec<_> = envelope
                .errors
                .iter()
                .map(|err| err.message.as_str())
                .collect();
            Err(FetchError::SchemaMismatch(format!(
                "response has no data, graphql errors: {}",
                messages.join("; ")
            )))
        }
    }
}
