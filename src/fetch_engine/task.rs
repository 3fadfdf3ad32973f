//! One target, rendered and extracted under the shared retry policy.

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

use super::fetch_types::{ErrorKind, FetchError, FetchOutcome, FetchTarget, IdentityKey};
use super::metrics::HarvestMetrics;
use super::page_timeout::with_page_timeout;
use super::retry::{RetryPolicy, RetryResult};
use crate::page_extractor::{DocumentIdResolver, ExtractedRecord, PageExtractor};
use crate::render_pool::{RawPage, RenderEngine, RenderOptions, RenderPool};

/// Everything a fetch needs, shared by every spawned task of a run.
///
/// Cloning is cheap; all heavy state sits behind `Arc`.
pub struct FetchTask<E: RenderEngine> {
    pool: Arc<RenderPool<E>>,
    policy: RetryPolicy,
    options: Arc<RenderOptions>,
    extractor: Arc<PageExtractor>,
    resolver: Arc<DocumentIdResolver>,
    identity_key: IdentityKey,
    attempt_deadline: Option<Duration>,
    metrics: HarvestMetrics,
}

impl<E: RenderEngine> Clone for FetchTask<E> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            policy: self.policy.clone(),
            options: Arc::clone(&self.options),
            extractor: Arc::clone(&self.extractor),
            resolver: Arc::clone(&self.resolver),
            identity_key: self.identity_key,
            attempt_deadline: self.attempt_deadline,
            metrics: self.metrics.clone(),
        }
    }
}

impl<E: RenderEngine> FetchTask<E> {
    /// Task with default policy, render options, extractor and resolver.
    pub fn new(pool: Arc<RenderPool<E>>) -> Self {
        Self {
            pool,
            policy: RetryPolicy::default(),
            options: Arc::new(RenderOptions::default()),
            extractor: Arc::new(PageExtractor::default()),
            resolver: Arc::new(DocumentIdResolver::default()),
            identity_key: IdentityKey::default(),
            attempt_deadline: None,
            metrics: HarvestMetrics::new(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: PageExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: DocumentIdResolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    #[must_use]
    pub fn with_identity_key(mut self, key: IdentityKey) -> Self {
        self.identity_key = key;
        self
    }

    /// Abort any single attempt running longer than `deadline`.
    #[must_use]
    pub fn with_attempt_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.attempt_deadline = deadline;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: HarvestMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<RenderPool<E>> {
        &self.pool
    }

    #[must_use]
    pub fn metrics(&self) -> &HarvestMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn identity_key(&self) -> IdentityKey {
        self.identity_key
    }

    /// Fetch and extract `target`. Always returns exactly one outcome.
    pub async fn run(&self, target: FetchTarget) -> FetchOutcome {
        let label = target.to_string();
        let result = self
            .policy
            .execute(&label, |attempt| self.attempt(&target, attempt))
            .await;

        self.metrics.add_attempts(result.attempts());
        match result {
            RetryResult::Succeeded { value, attempts } => {
                self.metrics.increment_succeeded();
                info!("Fetched {label} in {attempts} attempt(s)");
                FetchOutcome::Success {
                    target,
                    record: value,
                    attempts,
                }
            }
            RetryResult::Exhausted { error, attempts } => {
                self.metrics.increment_failed();
                warn!("Giving up on {label} after {attempts} attempt(s): {error}");
                FetchOutcome::failed(target, &error, attempts)
            }
        }
    }

    async fn attempt(
        &self,
        target: &FetchTarget,
        attempt: u32,
    ) -> Result<ExtractedRecord, FetchError> {
        let rendered = match self.attempt_deadline {
            Some(deadline) => {
                with_page_timeout(self.render(target), deadline, "Fetch attempt").await
            }
            None => self.render(target).await,
        };

        let page = match rendered {
            Ok(page) => page,
            Err(e) => {
                if e.kind() == ErrorKind::RenderingProcessDead
                    && self.pool.recreate_if_dead().await
                {
                    info!("Rendering process replaced after attempt {attempt} on {target}");
                }
                return Err(e);
            }
        };

        if let Some(status) = page.status
            && let Some(error) = FetchError::from_status(status, target.url())
        {
            return Err(error);
        }
        if !page.reveal_clicked {
            debug!("No reveal control on {target}, extracting the page as rendered");
        }

        self.build_record(target, &page)
    }

    /// Acquire a context, render, and release the context on every path.
    async fn render(&self, target: &FetchTarget) -> Result<RawPage, FetchError> {
        let mut guard = self.pool.acquire().await?;
        let rendered = guard.render(target.url(), &self.options).await;
        guard.release().await;
        rendered
    }

    fn build_record(
        &self,
        target: &FetchTarget,
        page: &RawPage,
    ) -> Result<ExtractedRecord, FetchError> {
        let identity = target.identity(self.identity_key);
        if identity.is_empty() {
            return Err(FetchError::MissingIdentity(target.url().to_string()));
        }

        let record = self
            .extractor
            .extract(&page.html)
            .with_identity(identity)
            .with_official_link(target.url())
            .with_document_id(self.resolver.resolve(&page.html));

        if record.is_empty_extraction() {
            self.metrics.increment_empty_extractions();
            warn!("Empty extraction for {target}: no title and no labelled fields matched");
        }
        Ok(record)
    }
}
