//! Type-safe builder for `HarvestConfig` using the typestate pattern
//!
//! `build()` only exists once the storage directory has been set.

use anyhow::{Result, bail};
use std::marker::PhantomData;
use std::path::PathBuf;

use super::types::HarvestConfig;
use crate::fetch_engine::IdentityKey;
use crate::utils::{MAX_CONCURRENCY, is_valid_url};

/// Upper bound accepted for `max_attempts`.
const MAX_ATTEMPTS_LIMIT: u32 = 10;

// Type states for the builder
pub struct WithStorageDir;

pub struct HarvestConfigBuilder<State = ()> {
    config: HarvestConfig,
    _phantom: PhantomData<State>,
}

impl Default for HarvestConfigBuilder<()> {
    fn default() -> Self {
        Self {
            config: HarvestConfig::default(),
            _phantom: PhantomData,
        }
    }
}

impl HarvestConfig {
    /// Create a builder for configuring a `HarvestConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> HarvestConfigBuilder<()> {
        HarvestConfigBuilder::default()
    }
}

impl HarvestConfigBuilder<()> {
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> HarvestConfigBuilder<WithStorageDir> {
        self.config.storage_dir = dir.into();
        HarvestConfigBuilder {
            config: self.config,
            _phantom: PhantomData,
        }
    }
}

// Build method only available when all required fields are set
impl HarvestConfigBuilder<WithStorageDir> {
    /// Validate and produce the config.
    ///
    /// # Errors
    ///
    /// Returns an error when a value is out of range or an endpoint is not
    /// an absolute http(s) URL.
    pub fn build(self) -> Result<HarvestConfig> {
        let c = self.config;

        if c.storage_dir.as_os_str().is_empty() {
            bail!("storage_dir must not be empty");
        }
        let name = c.snapshot_name.trim();
        if name.is_empty() || sanitize_filename::sanitize(name) != name {
            bail!("snapshot_name {:?} is not a plain file name", c.snapshot_name);
        }
        if !(1..=MAX_CONCURRENCY).contains(&c.concurrency) {
            bail!("concurrency must be between 1 and {MAX_CONCURRENCY}, got {}", c.concurrency);
        }
        if !(1..=MAX_CONCURRENCY).contains(&c.detail_concurrency) {
            bail!(
                "detail_concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                c.detail_concurrency
            );
        }
        if !(1..=MAX_ATTEMPTS_LIMIT).contains(&c.max_attempts) {
            bail!(
                "max_attempts must be between 1 and {MAX_ATTEMPTS_LIMIT}, got {}",
                c.max_attempts
            );
        }
        for (name, secs) in [
            ("startup_timeout_secs", c.startup_timeout_secs),
            ("navigation_timeout_secs", c.navigation_timeout_secs),
            ("load_timeout_secs", c.load_timeout_secs),
            ("reveal_timeout_secs", c.reveal_timeout_secs),
            ("http_timeout_secs", c.http_timeout_secs),
        ] {
            if secs == 0 {
                bail!("{name} must be greater than zero");
            }
        }
        if c.attempt_deadline_secs == Some(0) {
            bail!("attempt_deadline_secs must be greater than zero when set");
        }
        for (name, url) in [
            ("listing_url", &c.listing_url),
            ("detail_api_url", &c.detail_api_url),
            ("detail_page_base", &c.detail_page_base),
            ("site_origin", &c.site_origin),
            ("document_proxy_url", &c.document_proxy_url),
        ] {
            if !is_valid_url(url) {
                bail!("{name} is not an absolute http(s) URL: {url:?}");
            }
        }

        Ok(c)
    }
}

// Builder methods available at any state
impl<State> HarvestConfigBuilder<State> {
    #[must_use]
    pub fn snapshot_name(mut self, name: impl Into<String>) -> Self {
        self.config.snapshot_name = name.into();
        self
    }

    #[must_use]
    pub fn listing_url(mut self, url: impl Into<String>) -> Self {
        self.config.listing_url = url.into();
        self
    }

    #[must_use]
    pub fn detail_api_url(mut self, url: impl Into<String>) -> Self {
        self.config.detail_api_url = url.into();
        self
    }

    #[must_use]
    pub fn detail_page_base(mut self, url: impl Into<String>) -> Self {
        self.config.detail_page_base = url.into();
        self
    }

    #[must_use]
    pub fn site_origin(mut self, url: impl Into<String>) -> Self {
        self.config.site_origin = url.into();
        self
    }

    #[must_use]
    pub fn document_proxy_url(mut self, url: impl Into<String>) -> Self {
        self.config.document_proxy_url = url.into();
        self
    }

    /// Label of the control to click before extracting; `None` never clicks.
    #[must_use]
    pub fn reveal_label(mut self, label: Option<String>) -> Self {
        self.config.reveal_label = label;
        self
    }

    #[must_use]
    pub fn identity_key(mut self, key: IdentityKey) -> Self {
        self.config.identity_key = key;
        self
    }

    /// Detail pages rendered at the same time (default 3)
    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn detail_concurrency(mut self, concurrency: usize) -> Self {
        self.config.detail_concurrency = concurrency;
        self
    }

    /// Total attempts per target, first try included (default 3)
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn backoff_base_ms(mut self, ms: u64) -> Self {
        self.config.backoff_base_ms = ms;
        self
    }

    #[must_use]
    pub fn startup_timeout_secs(mut self, secs: u64) -> Self {
        self.config.startup_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.navigation_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn load_timeout_secs(mut self, secs: u64) -> Self {
        self.config.load_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn reveal_timeout_secs(mut self, secs: u64) -> Self {
        self.config.reveal_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn attempt_deadline_secs(mut self, secs: Option<u64>) -> Self {
        self.config.attempt_deadline_secs = secs;
        self
    }

    /// Download linked documents into `{storage_dir}/documents/`
    #[must_use]
    pub fn download_documents(mut self, enabled: bool) -> Self {
        self.config.download_documents = enabled;
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    #[must_use]
    pub fn chrome_executable(mut self, path: Option<PathBuf>) -> Self {
        self.config.chrome_executable = path;
        self
    }
}
