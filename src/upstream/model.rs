use serde::{Deserialize, Serialize};

/// Pagination metadata attached to every upstream page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total: u64,
    pub current_page: u32,
    pub last_page: u32,
    pub has_next_page: bool,
}

/// One page of search results as returned by AniList.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPage {
    pub page_info: PageInfo,
    pub media: Vec<MediaItem>,
}

/// Every variant is nullable upstream; a missing one is relayed as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTitle {
    #[serde(default)]
    pub romaji: Option<String>,
    #[serde(default)]
    pub english: Option<String>,
    #[serde(default)]
    pub native: Option<String>,
}

/// Cover art URLs by resolution plus the dominant color as a hex string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverImage {
    #[serde(default)]
    pub extra_large: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// A single anime entry, serialized back to callers unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: i64,
    pub title: MediaTitle,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub episodes: Option<u32>,
    pub genres: Vec<String>,
    pub cover_image: CoverImage,
    /// `None` when the upstream omitted the field; such items are not treated as adult.
    #[serde(default)]
    pub is_adult: Option<bool>,
}

impl MediaItem {
    pub fn flagged_adult(&self) -> bool {
        self.is_adult == Some(true)
    }
}

/// `{"data": {"Page": ...}, "errors": [...]}`
#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlEnvelope {
    #[serde(default)]
    pub data: Option<PageData>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageData {
    #[serde(rename = "Page")]
    pub page: MediaPage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct GraphQlRequest<'a> {
    pub query: &'static str,
    pub variables: SearchVariables<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchVariables<'a> {
    pub search: &'a str,
    pub page: u32,
    pub per_page: u32,
}
