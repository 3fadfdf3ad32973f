//! chromiumoxide-backed rendering engine.
//!
//! One Chrome process per [`ChromeProcess`]; each [`ChromeContext`] is a CDP
//! browser context (incognito-like: own cookies, storage and cache) holding
//! a single page.

use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::browser::{BrowserContextId, CloseParams};
use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::launcher::{LaunchOptions, launch_browser, resolve_executable};
use super::{BrowsingContext, RawPage, RenderEngine, RenderOptions, RenderProcess};
use crate::fetch_engine::{ErrorKind, FetchError, with_page_timeout};
use crate::utils::normalize_text;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Launches headless (or headful) Chrome with a throwaway profile per process.
#[derive(Debug, Clone)]
pub struct ChromeEngine {
    headless: bool,
    executable: Option<PathBuf>,
    profile_root: PathBuf,
    request_timeout: Duration,
    /// Browser binary, resolved (and downloaded if needed) once per engine
    resolved: Arc<OnceCell<PathBuf>>,
}

impl Default for ChromeEngine {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ChromeEngine {
    #[must_use]
    pub fn new(headless: bool) -> Self {
        Self {
            headless,
            executable: None,
            profile_root: std::env::temp_dir(),
            request_timeout: Duration::from_secs(crate::utils::DEFAULT_NAVIGATION_TIMEOUT_SECS),
            resolved: Arc::new(OnceCell::new()),
        }
    }

    /// Use this executable instead of searching for one.
    #[must_use]
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Parent directory for per-process profiles.
    #[must_use]
    pub fn with_profile_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.profile_root = root.into();
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Browser binary to launch, located or downloaded on first call.
    ///
    /// Resolution runs on its own task: a caller that gives up (an elapsed
    /// startup timeout) leaves a managed download running, and later callers
    /// wait on that same download.
    pub async fn executable_path(&self) -> Result<PathBuf, FetchError> {
        if let Some(path) = self.resolved.get() {
            return Ok(path.clone());
        }
        let cell = Arc::clone(&self.resolved);
        let explicit = self.executable.clone();
        let resolution = tokio::spawn(async move {
            cell.get_or_try_init(|| async {
                let source = resolve_executable(explicit.as_deref()).await?;
                info!("Using browser {source}");
                Ok::<_, anyhow::Error>(source.path().to_path_buf())
            })
            .await
            .cloned()
        });
        match resolution.await {
            Ok(Ok(path)) => Ok(path),
            Ok(Err(e)) => Err(FetchError::Internal(format!("No usable browser: {e:#}"))),
            Err(e) => Err(FetchError::Internal(format!("Browser resolution task failed: {e}"))),
        }
    }
}

impl RenderEngine for ChromeEngine {
    type Process = ChromeProcess;

    async fn prepare(&self) -> Result<(), FetchError> {
        self.executable_path().await.map(|_| ())
    }

    async fn launch(&self) -> Result<ChromeProcess, FetchError> {
        let executable = self.executable_path().await?;
        let profile_dir = self
            .profile_root
            .join(format!("kodegen_tenderscrape_{}", uuid::Uuid::new_v4()));

        let options = LaunchOptions {
            headless: self.headless,
            user_data_dir: profile_dir.clone(),
            request_timeout: self.request_timeout,
            executable: Some(executable),
        };

        let (browser, handler) = launch_browser(&options)
            .await
            .map_err(|e| FetchError::Internal(format!("Browser launch failed: {e:#}")))?;

        info!("Chrome ready with profile {}", profile_dir.display());
        Ok(ChromeProcess {
            browser,
            handler,
            profile_dir,
        })
    }
}

/// A running Chrome and its CDP handler task.
pub struct ChromeProcess {
    browser: Browser,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
}

impl RenderProcess for ChromeProcess {
    type Context = ChromeContext;

    async fn open_context(&self) -> Result<ChromeContext, FetchError> {
        let created = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| FetchError::classify_browser(&e))?;
        let context_id = created.result.browser_context_id.clone();

        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(FetchError::Internal)?;

        let page = match self.browser.new_page(params).await {
            Ok(page) => page,
            Err(e) => {
                self.dispose(context_id).await;
                return Err(FetchError::classify_browser(&e));
            }
        };

        let dialogs = match accept_dialogs(&page).await {
            Ok(task) => task,
            Err(e) => {
                if let Err(close_err) = page.close().await {
                    debug!("Closing page after listener failure: {close_err}");
                }
                self.dispose(context_id).await;
                return Err(e);
            }
        };

        Ok(ChromeContext {
            page,
            context_id,
            dialogs,
        })
    }

    async fn close_context(&self, context: ChromeContext) {
        let ChromeContext {
            page,
            context_id,
            dialogs,
        } = context;
        dialogs.abort();
        if let Err(e) = page.close().await {
            debug!("Page close failed: {e}");
        }
        self.dispose(context_id).await;
    }

    async fn shutdown(&self) {
        if let Err(e) = self.browser.execute(CloseParams::default()).await {
            debug!("Browser close command failed: {e}");
        }
        self.handler.abort();
        if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            debug!(
                "Could not remove profile {}: {e}",
                self.profile_dir.display()
            );
        }
    }
}

impl ChromeProcess {
    async fn dispose(&self, context_id: BrowserContextId) {
        if let Err(e) = self
            .browser
            .execute(DisposeBrowserContextParams::new(context_id))
            .await
        {
            debug!("Browser context dispose failed: {e}");
        }
    }
}

impl Drop for ChromeProcess {
    fn drop(&mut self) {
        self.handler.abort();
        if self.profile_dir.exists()
            && let Err(e) = std::fs::remove_dir_all(&self.profile_dir)
        {
            debug!(
                "Could not remove profile {}: {e}",
                self.profile_dir.display()
            );
        }
    }
}

/// One isolated browser context with its page.
pub struct ChromeContext {
    page: Page,
    context_id: BrowserContextId,
    dialogs: JoinHandle<()>,
}

impl BrowsingContext for ChromeContext {
    async fn render(&mut self, url: &str, options: &RenderOptions) -> Result<RawPage, FetchError> {
        let page = &self.page;

        with_page_timeout(
            async {
                page.goto(url)
                    .await
                    .map_err(|e| FetchError::classify_browser(&e))?;
                Ok(())
            },
            options.navigation_timeout,
            "Page navigation",
        )
        .await?;

        wait_for_page_load(page, options.load_timeout).await;
        let status = navigation_status(page).await;

        let reveal_clicked = match options.reveal_label.as_deref() {
            Some(label) => reveal(page, label, options).await?,
            None => false,
        };

        let html = page
            .content()
            .await
            .map_err(|e| FetchError::classify_browser(&e))?;

        Ok(RawPage {
            url: url.to_string(),
            html,
            status,
            reveal_clicked,
        })
    }
}

/// Accept every JavaScript dialog the page opens so navigation never stalls.
async fn accept_dialogs(page: &Page) -> Result<JoinHandle<()>, FetchError> {
    let mut events = page
        .event_listener::<EventJavascriptDialogOpening>()
        .await
        .map_err(|e| FetchError::classify_browser(&e))?;
    let page = page.clone();

    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            debug!("Accepting JavaScript dialog: {}", event.message);
            if let Err(e) = page.execute(HandleJavaScriptDialogParams::new(true)).await {
                debug!("Dialog accept failed: {e}");
            }
        }
    }))
}

/// Poll `document.readyState` until complete or `max_wait` passes.
///
/// Never fails: a page that never settles is still rendered as-is.
async fn wait_for_page_load(page: &Page, max_wait: Duration) {
    let start = Instant::now();
    loop {
        if let Ok(result) = page.evaluate("document.readyState").await
            && result.into_value::<String>().ok().as_deref() == Some("complete")
        {
            debug!("Page ready after {:.2}s", start.elapsed().as_secs_f64());
            return;
        }
        if start.elapsed() >= max_wait {
            warn!("Timeout waiting for page load after {max_wait:?}, proceeding anyway");
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// HTTP status of the main document from the Navigation Timing entry.
async fn navigation_status(page: &Page) -> Option<u16> {
    const SCRIPT: &str = r"
        (function() {
            const entry = performance.getEntriesByType('navigation')[0];
            return entry && entry.responseStatus ? entry.responseStatus : 0;
        })()
    ";
    let status = page.evaluate(SCRIPT).await.ok()?.into_value::<u16>().ok()?;
    (status > 0).then_some(status)
}

/// Click the button labelled `label` and wait for the content it reveals.
///
/// A missing control is normal and yields `false`. Only a dead browser is
/// an error here; anything else is logged and the page rendered without it.
async fn reveal(page: &Page, label: &str, options: &RenderOptions) -> Result<bool, FetchError> {
    let wanted = normalize_text(label);

    let buttons = match page.find_elements("button").await {
        Ok(buttons) => buttons,
        Err(e) => return tolerate(FetchError::classify_browser(&e)),
    };

    let mut control = None;
    for button in buttons {
        if let Ok(Some(text)) = button.inner_text().await
            && normalize_text(&text) == wanted
        {
            control = Some(button);
            break;
        }
    }
    let Some(control) = control else {
        debug!("Reveal control '{label}' not present");
        return Ok(false);
    };

    let clicked = with_page_timeout(
        async {
            control
                .scroll_into_view()
                .await
                .map_err(|e| FetchError::classify_browser(&e))?;
            control
                .click()
                .await
                .map_err(|e| FetchError::classify_browser(&e))?;
            Ok(())
        },
        options.reveal_timeout,
        "Reveal click",
    )
    .await;
    if let Err(e) = clicked {
        return tolerate(e);
    }

    if let Some(selector) = options.reveal_wait_selector.as_deref() {
        let start = Instant::now();
        while page.find_element(selector).await.is_err() {
            if start.elapsed() >= options.reveal_timeout {
                warn!(
                    "Revealed content '{selector}' did not appear within {:?}",
                    options.reveal_timeout
                );
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    Ok(true)
}

fn tolerate(error: FetchError) -> Result<bool, FetchError> {
    if error.kind() == ErrorKind::RenderingProcessDead {
        return Err(error);
    }
    warn!("Reveal step skipped: {error}");
    Ok(false)
}
