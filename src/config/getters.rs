//! Getter methods for `HarvestConfig`

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::HarvestConfig;
use crate::fetch_engine::IdentityKey;

impl HarvestConfig {
    #[must_use]
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    #[must_use]
    pub fn snapshot_name(&self) -> &str {
        &self.snapshot_name
    }

    /// `{storage_dir}/tender_data/{snapshot_name}.json`
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.storage_dir
            .join("tender_data")
            .join(format!("{}.json", self.snapshot_name))
    }

    #[must_use]
    pub fn listing_url(&self) -> &str {
        &self.listing_url
    }

    #[must_use]
    pub fn detail_api_url(&self) -> &str {
        &self.detail_api_url
    }

    #[must_use]
    pub fn detail_page_base(&self) -> &str {
        &self.detail_page_base
    }

    #[must_use]
    pub fn site_origin(&self) -> &str {
        &self.site_origin
    }

    #[must_use]
    pub fn document_proxy_url(&self) -> &str {
        &self.document_proxy_url
    }

    #[must_use]
    pub fn reveal_label(&self) -> Option<&str> {
        self.reveal_label.as_deref()
    }

    #[must_use]
    pub fn identity_key(&self) -> IdentityKey {
        self.identity_key
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[must_use]
    pub fn detail_concurrency(&self) -> usize {
        self.detail_concurrency
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    #[must_use]
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    #[must_use]
    pub fn reveal_timeout(&self) -> Duration {
        Duration::from_secs(self.reveal_timeout_secs)
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    #[must_use]
    pub fn attempt_deadline(&self) -> Option<Duration> {
        self.attempt_deadline_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn download_documents(&self) -> bool {
        self.download_documents
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn chrome_executable(&self) -> Option<&Path> {
        self.chrome_executable.as_deref()
    }
}
