/// MDBList list provider
///
/// Fetches list items page by page from the list service's items endpoint.
/// A list reference may be a full list URL, an `<owner>/<slug>` pair or a
/// numeric list id:
///
/// - `https://mdblist.com/lists/alice/weekend-picks` → `/lists/alice/weekend-picks/items`
/// - `alice/weekend-picks` → `/lists/alice/weekend-picks/items`
/// - `4711` → `/lists/4711/items`
use crate::{
    error::{AppError, AppResult},
    models::{MediaKind, RawListItem},
    services::providers::UpstreamListSource,
};
use reqwest::Client as HttpClient;
use serde::Deserialize;

/// Items response; each list splits its items by media kind
///
/// Items stay untyped here so one malformed item cannot fail the page.
#[derive(Debug, Default, Deserialize)]
struct ListItemsResponse {
    #[serde(default)]
    movies: Vec<serde_json::Value>,
    #[serde(default)]
    shows: Vec<serde_json::Value>,
}

impl ListItemsResponse {
    /// Decodes the items of one media kind, dropping those that fail
    fn into_items(self, kind: MediaKind) -> Vec<RawListItem> {
        let raw = match kind {
            MediaKind::Movie => self.movies,
            MediaKind::Series => self.shows,
        };

        raw.into_iter()
            .enumerate()
            .filter_map(|(position, value)| match serde_json::from_value(value) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::debug!(position = position, error = %e, "Dropping undecodable list item");
                    None
                }
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct MdbListSource {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl MdbListSource {
    pub fn new(api_key: String, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolves a list reference to the path under `/lists/`
    fn list_path(source: &str) -> AppResult<String> {
        let trimmed = source.trim().trim_end_matches('/');
        let path = match trimmed.find("/lists/") {
            Some(idx) => &trimmed[idx + "/lists/".len()..],
            None => trimmed,
        };
        let path = path.split(['?', '#']).next().unwrap_or_default();

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [id] if id.chars().all(|c| c.is_ascii_digit()) => Ok(id.to_string()),
            [owner, slug] => Ok(format!("{}/{}", owner, slug)),
            _ => Err(AppError::InvalidInput(format!(
                "Unrecognised list reference '{}'",
                source
            ))),
        }
    }
}

#[async_trait::async_trait]
impl UpstreamListSource for MdbListSource {
    async fn fetch_page(
        &self,
        user_id: &str,
        source: &str,
        kind: MediaKind,
        page_size: usize,
        page: usize,
    ) -> AppResult<Vec<RawListItem>> {
        let list_path = Self::list_path(source)?;
        let url = format!("{}/lists/{}/items", self.api_url, list_path);
        let limit = page_size.to_string();
        let offset = (page.saturating_sub(1) * page_size).to_string();

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "List API returned status {}: {}",
                status, body
            )));
        }

        let items = response.json::<ListItemsResponse>().await?.into_items(kind);

        tracing::debug!(
            user_id = %user_id,
            list = %list_path,
            kind = %kind,
            page = page,
            items = items.len(),
            provider = "mdblist",
            "List page fetched"
        );

        Ok(items)
    }

    fn name(&self) -> &'static str {
        "mdblist"
    }
}
