//! End-to-end harvest runs: listing, rendering, enrichment and merge.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::HarvestConfig;
use crate::documents::DocumentDownloader;
use crate::fetch_engine::{
    ConcurrentScheduler, ErrorKind, FetchOutcome, FetchTask, HarvestMetrics, MetricsSnapshot,
    validate_targets,
};
use crate::page_extractor::{ExtractedRecord, PageExtractor};
use crate::render_pool::{RenderEngine, RenderPool};
use crate::snapshot::{count_new, merge};
use crate::tender_api::TenderApiClient;

/// One page to harvest plus the listing metadata to carry onto its record.
#[derive(Debug, Clone, Default)]
pub struct HarvestInput {
    /// Business id (`tenderId`); may be empty for plain URLs
    pub id: String,
    pub url: String,
    pub metadata: BTreeMap<String, Value>,
}

impl HarvestInput {
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// A target that ended without a record.
#[derive(Debug, Clone, Serialize)]
pub struct FailedTarget {
    pub url: String,
    pub id: String,
    pub kind: ErrorKind,
    pub error: String,
    pub attempts: u32,
}

/// What a run did, logged at the end and returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub dates: Vec<NaiveDate>,
    pub listed: usize,
    pub skipped_known: usize,
    pub skipped_duplicate: usize,
    pub scheduled: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedTarget>,
    pub new_records: usize,
    pub snapshot_size: usize,
    pub snapshot_path: PathBuf,
    pub metrics: MetricsSnapshot,
}

/// Owns the rendering pool and API clients for a sequence of runs.
pub struct Harvester<E: RenderEngine> {
    config: HarvestConfig,
    pool: Arc<RenderPool<E>>,
    api: TenderApiClient,
    downloader: Option<DocumentDownloader>,
    metrics: HarvestMetrics,
}

impl<E: RenderEngine> Harvester<E> {
    /// Set up clients. The browser is launched lazily by the first fetch.
    pub fn new(config: HarvestConfig, engine: E) -> Result<Self> {
        let policy = config.retry_policy();
        let api =
            TenderApiClient::new(config.api_endpoints(), policy.clone(), config.http_timeout())
                .context("Failed to create API client")?;

        let downloader = if config.download_documents() {
            Some(
                DocumentDownloader::new(
                    config.document_proxy_url(),
                    config.storage_dir(),
                    policy,
                    config.http_timeout(),
                )
                .context("Failed to create document downloader")?,
            )
        } else {
            None
        };

        let pool = RenderPool::new(engine, config.startup_timeout());

        Ok(Self {
            config,
            pool,
            api,
            downloader,
            metrics: HarvestMetrics::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<RenderPool<E>> {
        &self.pool
    }

    #[must_use]
    pub fn metrics(&self) -> &HarvestMetrics {
        &self.metrics
    }

    /// Harvest every open invitation published between `from` and `to`, inclusive.
    ///
    /// A date whose listing cannot be fetched is logged and skipped.
    pub async fn run_dates(&self, from: NaiveDate, to: NaiveDate) -> Result<RunSummary> {
        if from > to {
            bail!("Start date {from} is after end date {to}");
        }

        let dates: Vec<NaiveDate> = from.iter_days().take_while(|d| *d <= to).collect();
        let mut inputs = Vec::new();

        for date in &dates {
            match self.api.open_invitations(*date).await {
                Ok(invitations) => {
                    info!(%date, open = invitations.len(), "Listing ready");
                    inputs.extend(invitations.into_iter().map(|(item, url)| HarvestInput {
                        id: item.tender_id().unwrap_or_default(),
                        url,
                        metadata: item
                            .metadata()
                            .into_iter()
                            .map(|(k, v)| (k.to_string(), v))
                            .collect(),
                    }));
                }
                Err(e) => warn!(%date, "Skipping date, listing unavailable: {e}"),
            }
        }

        self.harvest(inputs, dates).await
    }

    /// Harvest plain detail-page URLs without consulting the listing.
    pub async fn run_urls(&self, urls: &[String]) -> Result<RunSummary> {
        let inputs = urls.iter().map(HarvestInput::from_url).collect();
        self.harvest(inputs, Vec::new()).await
    }

    /// Fetch, enrich, merge and persist `inputs`.
    pub async fn harvest(
        &self,
        inputs: Vec<HarvestInput>,
        dates: Vec<NaiveDate>,
    ) -> Result<RunSummary> {
        let store = self.config.snapshot_store();
        let existing = store
            .load()
            .await
            .with_context(|| format!("Failed to load snapshot {}", store.path().display()))?;

        let listed = inputs.len();
        let mut metadata: HashMap<String, BTreeMap<String, Value>> = HashMap::new();
        let mut raw = Vec::with_capacity(listed);
        for input in inputs {
            let url = input.url.trim().to_string();
            if !input.metadata.is_empty() {
                metadata.entry(url.clone()).or_insert(input.metadata);
            }
            raw.push((input.id, url));
        }

        let (targets, rejected) = validate_targets(raw);
        let scheduler = ConcurrentScheduler::new(
            self.fetch_task(),
            existing.iter().map(|r| r.identity().to_string()),
        );
        let filtered = scheduler.filter(targets);
        let scheduled = filtered.scheduled.len();

        if scheduled > 0
            && let Err(e) = self.pool.prepare().await
        {
            warn!("Renderer setup failed, launches will report it per target: {e}");
        }

        let outcomes = scheduler
            .dispatch(filtered.scheduled, self.config.concurrency())
            .await;

        let mut fresh = Vec::new();
        let mut failed: Vec<FailedTarget> = Vec::new();
        for outcome in rejected.into_iter().chain(outcomes) {
            match outcome {
                FetchOutcome::Success { record, .. } => fresh.push(record),
                FetchOutcome::Failed {
                    target,
                    kind,
                    last_error,
                    attempts,
                } => failed.push(FailedTarget {
                    url: target.url().to_string(),
                    id: target.id().to_string(),
                    kind,
                    error: last_error,
                    attempts,
                }),
            }
        }
        let succeeded = fresh.len();

        let fresh = self.enrich(fresh, &metadata).await;

        let new_records = count_new(&existing, &fresh);
        let merged = merge(existing, fresh);
        store
            .persist(&merged)
            .await
            .with_context(|| format!("Failed to persist snapshot {}", store.path().display()))?;

        let summary = RunSummary {
            dates,
            listed,
            skipped_known: filtered.skipped_known,
            skipped_duplicate: filtered.skipped_duplicate,
            scheduled,
            succeeded,
            failed,
            new_records,
            snapshot_size: merged.len(),
            snapshot_path: store.path().to_path_buf(),
            metrics: self.metrics.snapshot(),
        };
        log_summary(&summary);
        Ok(summary)
    }

    /// Close the browser.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }

    fn fetch_task(&self) -> FetchTask<E> {
        FetchTask::new(Arc::clone(&self.pool))
            .with_policy(self.config.retry_policy())
            .with_render_options(self.config.render_options())
            .with_extractor(PageExtractor::new(self.config.site_origin()))
            .with_identity_key(self.config.identity_key())
            .with_attempt_deadline(self.config.attempt_deadline())
            .with_metrics(self.metrics.clone())
    }

    /// Attach listing metadata, detail bodies and downloaded documents.
    ///
    /// Completion order of `records` is preserved.
    async fn enrich(
        &self,
        records: Vec<ExtractedRecord>,
        metadata: &HashMap<String, BTreeMap<String, Value>>,
    ) -> Vec<ExtractedRecord> {
        futures::stream::iter(records)
            .map(|record| async move {
                let mut record = record;
                if let Some(extra) = metadata.get(&record.official_link) {
                    for (key, value) in extra {
                        record.extra.entry(key.clone()).or_insert_with(|| value.clone());
                    }
                }

                if let Some(document_id) = record.tender_document_id {
                    record.body = self.api.detail_body(document_id).await;
                }

                if let Some(downloader) = &self.downloader
                    && !record.document_links.is_empty()
                {
                    let paths = downloader
                        .download_all(&record.official_link, &record.document_links)
                        .await;
                    self.metrics.add_documents(paths.len());
                    record = record.with_extra("pdf_paths", paths);
                }
                record
            })
            .buffered(self.config.detail_concurrency())
            .collect()
            .await
    }
}

fn log_summary(summary: &RunSummary) {
    info!(
        listed = summary.listed,
        skipped_known = summary.skipped_known,
        scheduled = summary.scheduled,
        succeeded = summary.succeeded,
        failed = summary.failed.len(),
        new_records = summary.new_records,
        snapshot_size = summary.snapshot_size,
        empty_extractions = summary.metrics.empty_extractions,
        "Harvest run finished"
    );
    for failure in &summary.failed {
        warn!(
            url = %failure.url,
            kind = %failure.kind,
            attempts = failure.attempts,
            "Target failed: {}",
            failure.error
        );
    }
}
