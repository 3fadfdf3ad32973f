pub mod config;
pub mod documents;
pub mod fetch_engine;
pub mod harvester;
pub mod page_extractor;
pub mod render_pool;
pub mod snapshot;
pub mod tender_api;
pub mod utils;

pub use config::HarvestConfig;
pub use documents::DocumentDownloader;
pub use fetch_engine::{
    ConcurrentScheduler, ErrorKind, FetchError, FetchOutcome, FetchTarget, FetchTask,
    IdentityKey, RetryPolicy,
};
pub use harvester::{FailedTarget, HarvestInput, Harvester, RunSummary};
pub use page_extractor::{DocumentIdResolver, ExtractedRecord, PageExtractor};
pub use render_pool::{
    BrowsingContext, ChromeEngine, RawPage, RenderEngine, RenderOptions, RenderPool,
    RenderProcess,
};
pub use snapshot::{SnapshotError, SnapshotStore};
pub use tender_api::{ApiEndpoints, TenderApiClient};

/// Harvest one date range with the default Chrome engine and close the browser afterwards.
pub async fn harvest_dates(
    config: HarvestConfig,
    from: chrono::NaiveDate,
    to: chrono::NaiveDate,
) -> anyhow::Result<RunSummary> {
    let engine = config.chrome_engine();
    let harvester = Harvester::new(config, engine)?;
    let result = harvester.run_dates(from, to).await;
    harvester.shutdown().await;
    result
}
