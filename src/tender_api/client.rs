//! HTTP client for the portal's JSON endpoints.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::types::{DetailEnvelope, ListingItem};
use crate::fetch_engine::{FetchError, RetryPolicy};
use crate::utils::{CHROME_USER_AGENT, with_query};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Invalid endpoint: {0}")]
    Endpoint(String),

    #[error(transparent)]
    Request(#[from] FetchError),

    #[error("Unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to convert detail body to markdown: {0}")]
    Markdown(String),
}

/// Endpoints the client talks to.
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    pub listing_url: String,
    pub detail_api_url: String,
    pub detail_page_base: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            listing_url: crate::utils::DEFAULT_LISTING_URL.to_string(),
            detail_api_url: crate::utils::DEFAULT_DETAIL_API_URL.to_string(),
            detail_page_base: crate::utils::DEFAULT_DETAIL_PAGE_BASE.to_string(),
        }
    }
}

/// Listing and detail queries, retried under the shared policy.
#[derive(Debug, Clone)]
pub struct TenderApiClient {
    http: reqwest::Client,
    endpoints: ApiEndpoints,
    policy: RetryPolicy,
}

impl TenderApiClient {
    pub fn new(
        endpoints: ApiEndpoints,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(CHROME_USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            http,
            endpoints,
            policy,
        })
    }

    #[must_use]
    pub fn endpoints(&self) -> &ApiEndpoints {
        &self.endpoints
    }

    /// All listing items published on `date`, closed ones included.
    pub async fn fetch_listing(&self, date: NaiveDate) -> Result<Vec<ListingItem>, ApiError> {
        let day = date.format("%Y-%m-%d").to_string();
        let url = with_query(&self.endpoints.listing_url, &[("publishDate", &day)])
            .map_err(|e| ApiError::Endpoint(e.to_string()))?;

        // The backend answers `null` instead of `[]` on empty days.
        let items: Option<Vec<ListingItem>> = self.get_json(&url).await?;
        let items = items.unwrap_or_default();
        info!(date = %day, items = items.len(), "Fetched listing");
        Ok(items)
    }

    /// Harvestable items of `date` paired with their detail page URL.
    pub async fn open_invitations(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<(ListingItem, String)>, ApiError> {
        let items = self.fetch_listing(date).await?;
        let total = items.len();
        let open: Vec<_> = items
            .into_iter()
            .filter(ListingItem::is_harvestable)
            .filter_map(|item| {
                let url = self.detail_page_url(&item)?;
                Some((item, url))
            })
            .collect();
        debug!(total, open = open.len(), "Filtered closed and id-less items");
        Ok(open)
    }

    #[must_use]
    pub fn detail_page_url(&self, item: &ListingItem) -> Option<String> {
        item.invitation_id()
            .map(|id| format!("{}{id}", self.endpoints.detail_page_base))
    }

    /// Announcement body for `document_id` as markdown.
    pub async fn fetch_detail_body(&self, document_id: u64) -> Result<String, ApiError> {
        let id = document_id.to_string();
        let url = with_query(
            &self.endpoints.detail_api_url,
            &[("tenderDocumentId", &id), ("invitationTypeId", "1")],
        )
        .map_err(|e| ApiError::Endpoint(e.to_string()))?;

        let envelope: DetailEnvelope = self.get_json(&url).await?;
        let html = envelope.body();
        if html.trim().is_empty() {
            return Ok(String::new());
        }
        htmd::convert(html).map_err(|e| ApiError::Markdown(e.to_string()))
    }

    /// Like [`fetch_detail_body`](Self::fetch_detail_body), but any failure is an empty body.
    pub async fn detail_body(&self, document_id: u64) -> String {
        match self.fetch_detail_body(document_id).await {
            Ok(body) => body,
            Err(e) => {
                warn!(document_id, "Detail body unavailable: {e}");
                String::new()
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let bytes = self
            .policy
            .execute(url, |_| async {
                let response = self.http.get(url).send().await?;
                if let Some(error) = FetchError::from_status(response.status().as_u16(), url) {
                    return Err(error);
                }
                let bytes = response.bytes().await?;
                Ok::<_, FetchError>(bytes)
            })
            .await
            .into_result()?;

        serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
