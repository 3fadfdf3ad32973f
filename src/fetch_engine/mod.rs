//! Resilient concurrent fetch-and-extract engine.
//!
//! Targets flow through a [`ConcurrentScheduler`], which runs one
//! [`FetchTask`] per target under a counting semaphore. Each task renders
//! its page in an isolated browsing context, retries transient failures
//! under the shared [`RetryPolicy`], and reports exactly one [`FetchOutcome`].

pub mod fetch_types;
pub mod metrics;
pub mod page_timeout;
pub mod retry;
pub mod scheduler;
pub mod task;

pub use fetch_types::{ErrorKind, FetchError, FetchOutcome, FetchTarget, IdentityKey};
pub use metrics::{HarvestMetrics, MetricsSnapshot};
pub use page_timeout::with_page_timeout;
pub use retry::{AttemptPhase, RetryPolicy, RetryResult, RetryState};
pub use scheduler::{ConcurrentScheduler, FilteredTargets, validate_targets};
pub use task::FetchTask;
