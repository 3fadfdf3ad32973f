//! Locating, downloading and launching Chrome/Chromium.

use anyhow::{Context, Result, anyhow};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::utils::CHROME_USER_AGENT;

/// Environment variable naming an explicit browser binary.
pub const BROWSER_ENV_VAR: &str = "CHROMIUM_PATH";

/// Settings for one browser launch.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Profile directory, created if missing. Must be unique per process.
    pub user_data_dir: PathBuf,
    /// CDP request ceiling inside chromiumoxide
    pub request_timeout: Duration,
    /// Explicit executable; skips discovery when set
    pub executable: Option<PathBuf>,
}

/// Where the browser binary came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserSource {
    Configured(PathBuf),
    Environment(PathBuf),
    Installed(PathBuf),
    Managed(PathBuf),
}

impl BrowserSource {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Configured(p) | Self::Environment(p) | Self::Installed(p) | Self::Managed(p) => p,
        }
    }
}

impl fmt::Display for BrowserSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match self {
            Self::Configured(_) => "configured",
            Self::Environment(_) => BROWSER_ENV_VAR,
            Self::Installed(_) => "installed",
            Self::Managed(_) => "managed download",
        };
        write!(f, "{} ({origin})", self.path().display())
    }
}

/// Chromium switches for unattended rendering of the tender portal.
const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-extensions",
    "--disable-notifications",
    "--no-first-run",
    "--no-default-browser-check",
    "--no-sandbox",
    "--mute-audio",
    "--lang=mn-MN",
];

fn install_locations() -> Vec<PathBuf> {
    let raw: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else {
        &[
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/snap/bin/chromium",
        ]
    };
    raw.iter().map(PathBuf::from).collect()
}

/// Search `PATH` for a browser binary by name.
fn search_path() -> Option<PathBuf> {
    let names: &[&str] = if cfg!(target_os = "windows") {
        &["chrome.exe"]
    } else {
        &["chromium", "chromium-browser", "google-chrome-stable", "google-chrome"]
    };
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// Find an installed browser without downloading anything.
///
/// `CHROMIUM_PATH` wins, then well-known install locations, then `PATH`.
pub fn find_browser_executable() -> Option<BrowserSource> {
    if let Some(path) = std::env::var_os(BROWSER_ENV_VAR).map(PathBuf::from) {
        if path.is_file() {
            return Some(BrowserSource::Environment(path));
        }
        warn!("{BROWSER_ENV_VAR} points to a missing file: {}", path.display());
    }

    install_locations()
        .into_iter()
        .find(|p| p.is_file())
        .or_else(search_path)
        .map(BrowserSource::Installed)
}

/// Download a managed Chromium into the user cache directory.
pub async fn download_managed_browser() -> Result<BrowserSource> {
    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("kodegen_tenderscrape")
        .join("chromium");
    info!("No local browser, downloading Chromium into {}", cache_dir.display());

    tokio::fs::create_dir_all(&cache_dir)
        .await
        .with_context(|| format!("Failed to create {}", cache_dir.display()))?;

    let options = BrowserFetcherOptions::builder()
        .with_path(&cache_dir)
        .build()
        .context("Invalid browser fetcher options")?;
    let installation = BrowserFetcher::new(options)
        .fetch()
        .await
        .context("Chromium download failed")?;

    Ok(BrowserSource::Managed(installation.executable_path))
}

/// Resolve an executable: explicit path, then discovery, then download.
pub async fn resolve_executable(explicit: Option<&Path>) -> Result<BrowserSource> {
    if let Some(path) = explicit {
        return Ok(BrowserSource::Configured(path.to_path_buf()));
    }
    match find_browser_executable() {
        Some(source) => Ok(source),
        None => download_managed_browser().await,
    }
}

/// Launch a browser and spawn its CDP handler loop.
///
/// The handler task must outlive the [`Browser`]; abort it after closing.
pub async fn launch_browser(options: &LaunchOptions) -> Result<(Browser, JoinHandle<()>)> {
    let source = resolve_executable(options.executable.as_deref()).await?;
    info!("Launching browser {source}");

    tokio::fs::create_dir_all(&options.user_data_dir)
        .await
        .with_context(|| format!("Failed to create profile {}", options.user_data_dir.display()))?;

    let builder = BrowserConfigBuilder::default()
        .chrome_executable(source.path())
        .user_data_dir(&options.user_data_dir)
        .request_timeout(options.request_timeout)
        .window_size(1366, 900)
        .arg(format!("--user-agent={CHROME_USER_AGENT}"))
        .args(LAUNCH_ARGS.iter().copied());
    let builder = if options.headless {
        builder.headless_mode(HeadlessMode::New)
    } else {
        builder.with_head()
    };
    let config = builder
        .build()
        .map_err(|e| anyhow!("Invalid browser config: {e}"))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .with_context(|| format!("Failed to launch {source}"))?;

    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            let Err(e) = event else { continue };
            if is_benign_decode_error(&e.to_string()) {
                trace!("Ignoring undecodable CDP message: {e}");
            } else {
                error!("CDP handler error: {e}");
            }
        }
        debug!("CDP handler loop ended");
    });

    Ok((browser, handler_task))
}

/// chromiumoxide cannot decode every event newer Chrome builds emit.
fn is_benign_decode_error(message: &str) -> bool {
    message.contains("did not match any variant of untagged enum Message")
        || message.contains("Failed to deserialize WS response")
}
