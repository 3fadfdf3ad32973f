//! Core configuration type for harvest runs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::fetch_engine::IdentityKey;
use crate::utils::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_CONCURRENCY, DEFAULT_DETAIL_API_URL, DEFAULT_DETAIL_PAGE_BASE,
    DEFAULT_DOCUMENT_PROXY_URL, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LISTING_URL,
    DEFAULT_LOAD_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_NAVIGATION_TIMEOUT_SECS,
    DEFAULT_REVEAL_LABEL, DEFAULT_REVEAL_TIMEOUT_SECS, DEFAULT_SITE_ORIGIN, DEFAULT_SNAPSHOT_NAME,
    DEFAULT_STARTUP_TIMEOUT_SECS,
};

/// Everything a [`Harvester`](crate::Harvester) run needs.
///
/// Built through [`HarvestConfig::builder`], which validates ranges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Root for `tender_data/` and `documents/`.
    pub(crate) storage_dir: PathBuf,
    /// Snapshot file stem under `tender_data/`
    pub(crate) snapshot_name: String,

    pub(crate) listing_url: String,
    pub(crate) detail_api_url: String,
    pub(crate) detail_page_base: String,
    pub(crate) site_origin: String,
    pub(crate) document_proxy_url: String,

    /// Label of the optional control revealing the announcement; `None` disables the click
    pub(crate) reveal_label: Option<String>,
    pub(crate) identity_key: IdentityKey,

    pub(crate) concurrency: usize,
    /// Concurrent detail-body requests after rendering
    pub(crate) detail_concurrency: usize,
    pub(crate) max_attempts: u32,
    pub(crate) backoff_base_ms: u64,

    pub(crate) startup_timeout_secs: u64,
    pub(crate) navigation_timeout_secs: u64,
    pub(crate) load_timeout_secs: u64,
    pub(crate) reveal_timeout_secs: u64,
    pub(crate) http_timeout_secs: u64,
    /// Ceiling for a whole fetch attempt; `None` leaves only the per-step timeouts
    pub(crate) attempt_deadline_secs: Option<u64>,

    pub(crate) download_documents: bool,
    pub(crate) headless: bool,
    pub(crate) chrome_executable: Option<PathBuf>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::new(),
            snapshot_name: DEFAULT_SNAPSHOT_NAME.to_string(),
            listing_url: DEFAULT_LISTING_URL.to_string(),
            detail_api_url: DEFAULT_DETAIL_API_URL.to_string(),
            detail_page_base: DEFAULT_DETAIL_PAGE_BASE.to_string(),
            site_origin: DEFAULT_SITE_ORIGIN.to_string(),
            document_proxy_url: DEFAULT_DOCUMENT_PROXY_URL.to_string(),
            reveal_label: Some(DEFAULT_REVEAL_LABEL.to_string()),
            identity_key: IdentityKey::Url,
            concurrency: DEFAULT_CONCURRENCY,
            detail_concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            startup_timeout_secs: DEFAULT_STARTUP_TIMEOUT_SECS,
            navigation_timeout_secs: DEFAULT_NAVIGATION_TIMEOUT_SECS,
            load_timeout_secs: DEFAULT_LOAD_TIMEOUT_SECS,
            reveal_timeout_secs: DEFAULT_REVEAL_TIMEOUT_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            attempt_deadline_secs: None,
            download_documents: false,
            headless: true,
            chrome_executable: None,
        }
    }
}
