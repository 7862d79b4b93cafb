use thiserror::Error;
use tracing::{debug, info};

use crate::upstream::{FetchError, MediaItem, MediaPage};

/// Anything that can produce numbered result pages for a search string.
pub trait PageSource {
    fn fetch_page(
        &self,
        search: &str,
        page: u32,
    ) -> impl Future<Output = Result<MediaPage, FetchError>> + Send;
}

/// Non-empty free-text search term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery(String);

impl SearchQuery {
    /// Returns `None` for an empty term.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.is_empty() { None } else { Some(Self(raw)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Every non-adult item across all fetched pages, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResult {
    pub media: Vec<MediaItem>,
    pub pages_fetched: u32,
    pub adult_filtered: usize,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("failed to fetch page {page}")]
    Fetch {
        page: u32,
        #[source]
        source: FetchError,
    },

    #[error("upstream still reported more results after {max_pages} pages")]
    PaginationLimitExceeded { max_pages: u32 },
}

impl SearchError {
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::Fetch { source, .. } => source.kind(),
            SearchError::PaginationLimitExceeded { .. } => "pagination_limit_exceeded",
        }
    }
}

pub struct SearchService;

impl SearchService {
    /// Walk pages from 1 until the upstream reports no next page, dropping
    /// adult items. Any page failure aborts the whole search.
    pub async fn aggregate<S: PageSource>(
        source: &S,
        query: &SearchQuery,
        max_pages: u32,
    ) -> Result<AggregatedResult, SearchError> {
        let mut media = Vec::new();
        let mut adult_filtered = 0usize;
        let mut page = 1u32;

        loop {
            let fetched = source
                .fetch_page(query.as_str(), page)
                .await
                .map_err(|source| SearchError::Fetch { page, source })?;

            let has_next_page = fetched.page_info.has_next_page;
            let received = fetched.media.len();
            let before = media.len();
            media.extend(fetched.media.into_iter().filter(|item| !item.flagged_adult()));
            let dropped = received - (media.len() - before);
            adult_filtered += dropped;

            debug!(page, received, dropped, has_next_page, "fetched upstream page");

            if !has_next_page {
                break;
            }
            if page >= max_pages {
                return Err(SearchError::PaginationLimitExceeded { max_pages });
            }
            page += 1;
        }

        let result = AggregatedResult {
            media,
            pages_fetched: page,
            adult_filtered,
        };
        info!(
            pages = result.pages_fetched,
            items = result.media.len(),
            adult_filtered = result.adult_filtered,
            "search aggregated"
        );

        Ok(result)
    }
}
