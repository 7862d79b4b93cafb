use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::Serialize;
use tracing::instrument;

use crate::{
    api::{ApiError, ApiResult},
    routes::AppState,
    services::search::{AggregatedResult, SearchQuery, SearchService},
    upstream::MediaItem,
};

pub const MISSING_QUERY_MESSAGE: &str = "Query parameter 'q' is required";

#[derive(Debug, Serialize)]
pub struct AnimeSearchResponse {
    pub media: Vec<MediaItem>,
}

/// `GET /api/search?q=...`: every non-adult AniList match across all pages.
#[instrument(skip_all)]
pub async fn anime_search(
    State(state): State<AppState>,
    params: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult<AnimeSearchResponse> {
    let query = params
        .ok()
        .and_then(|Query(pairs)| first_value(pairs, "q"))
        .and_then(SearchQuery::new)
        .ok_or_else(|| ApiError::bad_request(MISSING_QUERY_MESSAGE))?;

    let result = SearchService::aggregate(
        &state.upstream,
        &query,
        state.config.upstream.max_pages,
    )
    .await?;

    Ok(Json(AnimeSearchResponse::from(result)))
}

/// Repeated keys are allowed; only the first occurrence counts.
fn first_value(pairs: Vec<(String, String)>, key: &str) -> Option<String> {
    pairs
        .into_iter()
        .find_map(|(name, value)| (name == key).then_some(value))
}

impl From<AggregatedResult> for AnimeSearchResponse {
    fn from(value: AggregatedResult) -> Self {
        Self {
            media: value.media,
        }
    }
}
