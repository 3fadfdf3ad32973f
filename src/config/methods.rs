//! Runtime components derived from a `HarvestConfig`

use super::types::HarvestConfig;
use crate::fetch_engine::RetryPolicy;
use crate::page_extractor::selectors::DETAIL_DIALOG;
use crate::render_pool::{ChromeEngine, RenderOptions};
use crate::snapshot::SnapshotStore;
use crate::tender_api::ApiEndpoints;

impl HarvestConfig {
    /// The single policy shared by fetch tasks, API queries and downloads.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.backoff_base())
    }

    #[must_use]
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            navigation_timeout: self.navigation_timeout(),
            load_timeout: self.load_timeout(),
            reveal_label: self.reveal_label.clone(),
            reveal_timeout: self.reveal_timeout(),
            reveal_wait_selector: Some(DETAIL_DIALOG.to_string()),
        }
    }

    #[must_use]
    pub fn api_endpoints(&self) -> ApiEndpoints {
        ApiEndpoints {
            listing_url: self.listing_url.clone(),
            detail_api_url: self.detail_api_url.clone(),
            detail_page_base: self.detail_page_base.clone(),
        }
    }

    #[must_use]
    pub fn snapshot_store(&self) -> SnapshotStore {
        SnapshotStore::new(self.snapshot_path())
    }

    /// Chrome engine honoring `headless`, the executable override and timeouts.
    #[must_use]
    pub fn chrome_engine(&self) -> ChromeEngine {
        let engine =
            ChromeEngine::new(self.headless).with_request_timeout(self.navigation_timeout());
        match &self.chrome_executable {
            Some(path) => engine.with_executable(path),
            None => engine,
        }
    }
}
