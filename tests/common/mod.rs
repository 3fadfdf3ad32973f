//! Test utilities shared by the tenderscrape integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use kodegen_tools_tenderscrape::{
    BrowsingContext, FetchError, RawPage, RenderEngine, RenderOptions, RenderProcess,
};

/// Scripted behaviour of one render call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Fixture detail page for the URL, status 200, reveal control clicked
    Page,
    /// Fixture detail page without the reveal control
    PageWithoutReveal,
    /// Arbitrary markup, status 200
    Markup(String),
    /// HTTP status on the main document with a fixture body
    Status(u16),
    /// The rendering process crashes mid-navigation
    ProcessDead,
    /// Navigation times out
    Timeout,
    /// The task panics inside the render call
    Panic,
}

#[derive(Default)]
struct MockState {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    render_calls: Mutex<HashMap<String, u32>>,
    render_starts: Mutex<HashMap<String, Vec<Instant>>>,
    prepares: AtomicUsize,
    launches: AtomicUsize,
    shutdowns: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Rendering engine whose pages come from per-URL scripts.
///
/// Each render pops the next script for its URL; the last one repeats.
/// URLs without a script render the fixture page.
#[derive(Clone, Default)]
pub struct MockEngine {
    state: Arc<MockState>,
    render_delay: Duration,
    prepare_delay: Duration,
    shutdown_delay: Duration,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every render for `delay` so that concurrent tasks overlap.
    pub fn with_render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = delay;
        self
    }

    /// Make `prepare` take `delay`, like a first-run browser download.
    pub fn with_prepare_delay(mut self, delay: Duration) -> Self {
        self.prepare_delay = delay;
        self
    }

    /// Make process shutdown hang for `delay`, like a wedged browser.
    pub fn with_shutdown_delay(mut self, delay: Duration) -> Self {
        self.shutdown_delay = delay;
        self
    }

    pub fn script(&self, url: &str, steps: impl IntoIterator<Item = Script>) -> &Self {
        self.state
            .scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), steps.into_iter().collect());
        self
    }

    pub fn render_calls(&self, url: &str) -> u32 {
        self.state.render_calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    /// When each render of `url` started, oldest first.
    pub fn render_starts(&self, url: &str) -> Vec<Instant> {
        self.state
            .render_starts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_default()
    }

    pub fn prepares(&self) -> usize {
        self.state.prepares.load(Ordering::SeqCst)
    }

    pub fn total_render_calls(&self) -> u32 {
        self.state.render_calls.lock().unwrap().values().sum()
    }

    pub fn launches(&self) -> usize {
        self.state.launches.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.state.shutdowns.load(Ordering::SeqCst)
    }

    pub fn contexts_opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn contexts_closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.state.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_script(&self, url: &str) -> Script {
        *self
            .state
            .render_calls
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default() += 1;

        let mut scripts = self.state.scripts.lock().unwrap();
        match scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Script::Page),
            Some(queue) => queue.front().cloned().unwrap_or(Script::Page),
            None => Script::Page,
        }
    }
}

impl RenderEngine for MockEngine {
    type Process = MockProcess;

    async fn prepare(&self) -> Result<(), FetchError> {
        if !self.prepare_delay.is_zero() {
            tokio::time::sleep(self.prepare_delay).await;
        }
        self.state.prepares.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn launch(&self) -> Result<MockProcess, FetchError> {
        self.state.launches.fetch_add(1, Ordering::SeqCst);
        Ok(MockProcess {
            engine: self.clone(),
        })
    }
}

pub struct MockProcess {
    engine: MockEngine,
}

impl RenderProcess for MockProcess {
    type Context = MockContext;

    async fn open_context(&self) -> Result<MockContext, FetchError> {
        self.engine.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockContext {
            engine: self.engine.clone(),
        })
    }

    async fn close_context(&self, _context: MockContext) {
        self.engine.state.closed.fetch_add(1, Ordering::SeqCst);
    }

    async fn shutdown(&self) {
        if !self.engine.shutdown_delay.is_zero() {
            tokio::time::sleep(self.engine.shutdown_delay).await;
        }
        self.engine.state.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockContext {
    engine: MockEngine,
}

/// Keeps the in-flight count right even when a render panics.
struct InFlight<'a>(&'a MockState);

impl<'a> InFlight<'a> {
    fn enter(state: &'a MockState) -> Self {
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl BrowsingContext for MockContext {
    async fn render(&mut self, url: &str, _options: &RenderOptions) -> Result<RawPage, FetchError> {
        let _in_flight = InFlight::enter(&self.engine.state);
        self.engine
            .state
            .render_starts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push(Instant::now());
        if !self.engine.render_delay.is_zero() {
            tokio::time::sleep(self.engine.render_delay).await;
        }

        let page = |html: String, status: u16, reveal_clicked: bool| RawPage {
            url: url.to_string(),
            html,
            status: Some(status),
            reveal_clicked,
        };

        match self.engine.next_script(url) {
            Script::Page => Ok(page(detail_page(url, true), 200, true)),
            Script::PageWithoutReveal => Ok(page(detail_page(url, false), 200, false)),
            Script::Markup(html) => Ok(page(html, 200, true)),
            Script::Status(status) => Ok(page(detail_page(url, true), status, false)),
            Script::ProcessDead => Err(FetchError::RenderingProcessDead(
                "websocket connection closed".to_string(),
            )),
            Script::Timeout => Err(FetchError::NetworkTimeout(format!(
                "navigation to {url} timed out"
            ))),
            Script::Panic => panic!("renderer blew up on {url}"),
        }
    }
}

/// Stable document id derived from the URL's last segment.
pub fn document_id_for(url: &str) -> u64 {
    url.rsplit('/')
        .next()
        .and_then(|segment| segment.parse::<u64>().ok())
        .map_or(777, |n| 9_000_000 + n)
}

/// Rendered detail page in the markup shape of the live site.
pub fn detail_page(url: &str, with_dialog: bool) -> String {
    let segment = url.rsplit('/').next().unwrap_or_default();
    let document_id = document_id_for(url);
    let dialog = if with_dialog {
        r#"<div class="flex flex-1 flex-col gap-3 p-10 pt-10">
             <ol><li>Тусгай зөвшөөрөлтэй байх</li><li>Санхүүгийн  тайлан</li></ol>
           </div>"#
    } else {
        ""
    };
    format!(
        r#"<!DOCTYPE html>
<html><head><title>Tender {segment}</title></head>
<body>
  <h1 class="text-2xl lg:text-3xl font-bold mb-4">Тендер {segment}</h1>
  <div class="p-4 md:p-6 rounded-lg bg-default-100">
    <div class="grid grid-cols-1 md:grid-cols-2 items-center md:gap-4">
      <div class="text-sm md:text-right text-default-500 font-light">Захиалагч</div>
      <div class="text-sm"><div>Захиалагч {segment}</div></div>
    </div>
    <div class="grid grid-cols-1 md:grid-cols-2 items-center md:gap-4">
      <div class="text-sm md:text-right text-default-500 font-light">Төсөв</div>
      <div class="text-sm">1,000,000 ₮</div>
    </div>
  </div>
  {dialog}
  <div class="w-full px-0">
    <a class="p-3 flex rounded-lg border border-divider" href="/files/{segment}.pdf">{segment}.pdf</a>
  </div>
  <script>self.__next_f.push([1,"{{\"tenderDocumentId\":{document_id}}}"])</script>
</body></html>"#
    )
}

pub fn detail_url(n: u32) -> String {
    format!("https://www.tender.gov.mn/mn/invitation/detail/{n}")
}

pub fn detail_urls(count: u32) -> Vec<String> {
    (1..=count).map(detail_url).collect()
}

/// Initialize logging once for tests that want to see it (`RUST_LOG=debug`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
