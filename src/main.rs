// Tender harvester CLI
//
// Harvests open invitations for a publish-date range (or a list of detail
// URLs) into the incremental JSON snapshot under the storage directory.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use kodegen_tools_tenderscrape::utils::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, DEFAULT_SNAPSHOT_NAME,
};
use kodegen_tools_tenderscrape::{HarvestConfig, Harvester};

/// Harvest tender announcements into an incremental snapshot
#[derive(Parser, Debug)]
#[command(name = "kodegen-tenderscrape", version, about)]
struct Args {
    /// First publish date to harvest (defaults to today)
    #[arg(long, env = "TENDER_FROM")]
    from: Option<NaiveDate>,

    /// Last publish date to harvest, inclusive (defaults to `--from`)
    #[arg(long, env = "TENDER_TO")]
    to: Option<NaiveDate>,

    /// Harvest these detail pages instead of the listing (repeatable)
    #[arg(long = "url")]
    urls: Vec<String>,

    /// Root directory for the snapshot and downloaded documents
    #[arg(long, env = "TENDER_STORAGE_DIR", default_value = ".")]
    storage_dir: PathBuf,

    /// Snapshot file stem under `tender_data/`
    #[arg(long, env = "TENDER_SNAPSHOT_NAME", default_value = DEFAULT_SNAPSHOT_NAME)]
    snapshot_name: String,

    /// Detail pages rendered at the same time
    #[arg(long, short = 'j', env = "TENDER_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Attempts per page, first try included
    #[arg(long, env = "TENDER_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Download linked documents into `documents/`
    #[arg(long, env = "TENDER_DOCUMENTS")]
    documents: bool,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Chrome/Chromium binary to use instead of auto-detection
    #[arg(long, env = "CHROMIUM_PATH")]
    chrome: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("kodegen_tools_tenderscrape=info")),
        )
        .init();

    let args = Args::parse();

    let config = HarvestConfig::builder()
        .storage_dir(args.storage_dir)
        .snapshot_name(args.snapshot_name)
        .concurrency(args.concurrency)
        .max_attempts(args.max_attempts)
        .download_documents(args.documents)
        .headless(!args.headful)
        .chrome_executable(args.chrome)
        .build()
        .context("Invalid configuration")?;

    let engine = config.chrome_engine();
    let harvester = Harvester::new(config, engine)?;

    let result = if args.urls.is_empty() {
        let from = args.from.unwrap_or_else(|| Local::now().date_naive());
        let to = args.to.unwrap_or(from);
        harvester.run_dates(from, to).await
    } else {
        harvester.run_urls(&args.urls).await
    };
    harvester.shutdown().await;

    let summary = result?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.succeeded == 0 && !summary.failed.is_empty() {
        anyhow::bail!("All {} targets failed", summary.failed.len());
    }
    Ok(())
}
