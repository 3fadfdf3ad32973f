//! Shared rendering process with per-task isolated browsing contexts
//!
//! One long-lived rendering process is launched lazily and shared by every
//! fetch task. Each task gets its own browsing context (separate cookies and
//! storage) through [`RenderPool::acquire`], and hands it back through
//! [`ContextGuard::release`]. A crash flags the process for recreation; the
//! next acquisition launches a fresh one.

pub mod chrome;
pub mod launcher;

use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::fetch_engine::{ErrorKind, FetchError};

pub use chrome::{ChromeContext, ChromeEngine, ChromeProcess};

// =============================================================================
// Rendering seams
// =============================================================================

/// Rendered result of one navigation. Owned by the task that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// URL that was navigated to
    pub url: String,
    /// Serialized DOM after scripts ran and the reveal control (if any) was clicked
    pub html: String,
    /// HTTP status of the main document when the engine could observe it
    pub status: Option<u16>,
    /// Whether the optional reveal control was found and activated
    pub reveal_clicked: bool,
}

/// Per-navigation knobs handed to [`BrowsingContext::render`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub navigation_timeout: Duration,
    pub load_timeout: Duration,
    /// Visible label of the optional control gating detail content
    pub reveal_label: Option<String>,
    pub reveal_timeout: Duration,
    /// Selector that appears once the reveal control has done its job
    pub reveal_wait_selector: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(crate::utils::DEFAULT_NAVIGATION_TIMEOUT_SECS),
            load_timeout: Duration::from_secs(crate::utils::DEFAULT_LOAD_TIMEOUT_SECS),
            reveal_label: Some(crate::utils::DEFAULT_REVEAL_LABEL.to_string()),
            reveal_timeout: Duration::from_secs(crate::utils::DEFAULT_REVEAL_TIMEOUT_SECS),
            reveal_wait_selector: Some(crate::page_extractor::selectors::DETAIL_DIALOG.to_string()),
        }
    }
}

/// Launches rendering processes.
pub trait RenderEngine: Send + Sync + 'static {
    type Process: RenderProcess;

    /// One-off setup that may take arbitrarily long, such as locating or
    /// downloading the browser binary. Not bounded by the startup timeout.
    fn prepare(&self) -> impl Future<Output = Result<(), FetchError>> + Send {
        async { Ok(()) }
    }

    fn launch(&self) -> impl Future<Output = Result<Self::Process, FetchError>> + Send;
}

/// A live rendering process that hosts isolated browsing contexts.
pub trait RenderProcess: Send + Sync + 'static {
    type Context: BrowsingContext;

    fn open_context(&self) -> impl Future<Output = Result<Self::Context, FetchError>> + Send;

    /// Tear down one context. Never fails; problems are logged.
    fn close_context(&self, context: Self::Context) -> impl Future<Output = ()> + Send;

    /// Stop the process. Contexts still open become unusable.
    fn shutdown(&self) -> impl Future<Output = ()> + Send;
}

/// One isolated browsing sandbox, exclusively owned by a single task.
pub trait BrowsingContext: Send + 'static {
    fn render(
        &mut self,
        url: &str,
        options: &RenderOptions,
    ) -> impl Future<Output = Result<RawPage, FetchError>> + Send;
}

pub type ContextOf<E> = <<E as RenderEngine>::Process as RenderProcess>::Context;

// =============================================================================
// Pool
// =============================================================================

/// Owner of the single shared rendering process.
pub struct RenderPool<E: RenderEngine> {
    engine: E,
    /// Current process and the generation it was launched as
    process: Mutex<Option<(u64, Arc<E::Process>)>>,
    needs_recreation: AtomicBool,
    startup_timeout: Duration,
    generation: AtomicU64,
    launches: AtomicU64,
    active_contexts: AtomicUsize,
    peak_contexts: AtomicUsize,
}

impl<E: RenderEngine> RenderPool<E> {
    /// Create a pool. Nothing is launched until the first [`acquire`](Self::acquire).
    pub fn new(engine: E, startup_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            engine,
            process: Mutex::new(None),
            needs_recreation: AtomicBool::new(false),
            startup_timeout,
            generation: AtomicU64::new(0),
            launches: AtomicU64::new(0),
            active_contexts: AtomicUsize::new(0),
            peak_contexts: AtomicUsize::new(0),
        })
    }

    /// Open a fresh browsing context, launching the process on first use.
    ///
    /// Launch and context creation are each bounded by the startup timeout;
    /// exceeding it fails this acquisition only.
    pub async fn acquire(self: &Arc<Self>) -> Result<ContextGuard<E>, FetchError> {
        let (generation, process) = self.live_process().await?;

        let context = match tokio::time::timeout(self.startup_timeout, process.open_context()).await
        {
            Ok(Ok(context)) => context,
            Ok(Err(e)) => {
                if e.kind() == ErrorKind::RenderingProcessDead {
                    self.mark_dead(generation, &e.to_string());
                }
                return Err(e);
            }
            Err(_) => return Err(FetchError::StartupTimeout(self.startup_timeout)),
        };

        let active = self.active_contexts.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_contexts.fetch_max(active, Ordering::SeqCst);
        debug!("Opened browsing context on process {generation} ({active} active)");

        Ok(ContextGuard {
            context: Some(context),
            process,
            generation,
            pool: Arc::clone(self),
        })
    }

    /// Tear down a context. The process keeps running.
    pub async fn release(&self, guard: ContextGuard<E>) {
        guard.release().await;
    }

    /// Flag the process launched as `generation` as gone.
    ///
    /// Reports about an older, already replaced process are ignored.
    pub fn mark_dead(&self, generation: u64, reason: &str) {
        if self.generation.load(Ordering::SeqCst) == generation {
            warn!("Rendering process {generation} flagged dead: {reason}");
            self.needs_recreation.store(true, Ordering::SeqCst);
        }
    }

    /// Discard a process flagged dead. The next acquisition launches a new one.
    ///
    /// Returns whether a process was discarded.
    pub async fn recreate_if_dead(&self) -> bool {
        let mut slot = self.process.lock().await;
        self.discard_if_dead(&mut slot)
    }

    /// Run the engine's one-off setup ahead of the first acquisition.
    pub async fn prepare(&self) -> Result<(), FetchError> {
        self.engine.prepare().await
    }

    /// Stop the process, if any.
    pub async fn shutdown(&self) {
        let taken = self.process.lock().await.take();
        if let Some((generation, process)) = taken {
            info!("Shutting down rendering process {generation}");
            process.shutdown().await;
        }
    }

    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Contexts currently checked out
    #[must_use]
    pub fn active_contexts(&self) -> usize {
        self.active_contexts.load(Ordering::SeqCst)
    }

    /// Highest number of contexts ever checked out at once
    #[must_use]
    pub fn peak_contexts(&self) -> usize {
        self.peak_contexts.load(Ordering::SeqCst)
    }

    /// Number of processes launched over the pool's lifetime
    #[must_use]
    pub fn launch_count(&self) -> u64 {
        self.launches.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn needs_recreation(&self) -> bool {
        self.needs_recreation.load(Ordering::SeqCst)
    }

    async fn live_process(&self) -> Result<(u64, Arc<E::Process>), FetchError> {
        let mut slot = self.process.lock().await;
        self.discard_if_dead(&mut slot);

        if let Some((generation, process)) = slot.as_ref() {
            return Ok((*generation, Arc::clone(process)));
        }

        let launched = match tokio::time::timeout(self.startup_timeout, self.engine.launch()).await
        {
            Ok(Ok(process)) => process,
            Ok(Err(e)) => {
                warn!("Rendering process launch failed: {e}");
                return Err(e);
            }
            Err(_) => {
                warn!("Rendering process launch exceeded {:?}", self.startup_timeout);
                return Err(FetchError::StartupTimeout(self.startup_timeout));
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.launches.fetch_add(1, Ordering::SeqCst);
        info!("Launched rendering process {generation}");

        let process = Arc::new(launched);
        *slot = Some((generation, Arc::clone(&process)));
        Ok((generation, process))
    }

    /// Drop a process flagged dead from `slot`.
    ///
    /// Its shutdown runs on a background task bounded by the startup timeout,
    /// so a hung process never holds up acquisitions waiting on the slot.
    fn discard_if_dead(&self, slot: &mut Option<(u64, Arc<E::Process>)>) -> bool {
        if !self.needs_recreation.swap(false, Ordering::SeqCst) {
            return false;
        }
        if let Some((generation, dead)) = slot.take() {
            info!("Discarding dead rendering process {generation}");
            let limit = self.startup_timeout;
            tokio::spawn(async move {
                if tokio::time::timeout(limit, dead.shutdown()).await.is_err() {
                    warn!("Dead rendering process {generation} did not shut down within {limit:?}");
                }
            });
        }
        true
    }
}

// =============================================================================
// Scoped context
// =============================================================================

/// Exclusive handle on one browsing context.
///
/// Call [`release`](Self::release) on every exit path; dropping the guard
/// without it still closes the context, on a background task.
pub struct ContextGuard<E: RenderEngine> {
    context: Option<ContextOf<E>>,
    process: Arc<E::Process>,
    generation: u64,
    pool: Arc<RenderPool<E>>,
}

impl<E: RenderEngine> ContextGuard<E> {
    pub fn context_mut(&mut self) -> &mut ContextOf<E> {
        self.context.as_mut().expect("context should be present until release")
    }

    /// Generation of the process hosting this context
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Render `url` inside this context, flagging the process on a crash.
    pub async fn render(
        &mut self,
        url: &str,
        options: &RenderOptions,
    ) -> Result<RawPage, FetchError> {
        let result = self.context_mut().render(url, options).await;
        if let Err(e) = &result
            && e.kind() == ErrorKind::RenderingProcessDead
        {
            self.pool.mark_dead(self.generation, &e.to_string());
        }
        result
    }

    /// Close the context and wait for teardown to finish.
    pub async fn release(mut self) {
        if let Some(context) = self.context.take() {
            self.process.close_context(context).await;
            let active = self.pool.active_contexts.fetch_sub(1, Ordering::SeqCst) - 1;
            debug!("Released browsing context ({active} active)");
        }
    }
}

impl<E: RenderEngine> Drop for ContextGuard<E> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.pool.active_contexts.fetch_sub(1, Ordering::SeqCst);
            warn!("Browsing context dropped without release - closing in background");
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let process = Arc::clone(&self.process);
                handle.spawn(async move {
                    process.close_context(context).await;
                });
            }
        }
    }
}
