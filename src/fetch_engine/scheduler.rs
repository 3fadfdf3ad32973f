//! Bounded-parallel dispatch of fetch tasks.

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::fetch_types::{FetchError, FetchOutcome, FetchTarget};
use super::task::FetchTask;
use crate::render_pool::RenderEngine;

/// Targets left after removing known and repeated identities.
#[derive(Debug, Clone, Default)]
pub struct FilteredTargets {
    pub scheduled: Vec<FetchTarget>,
    pub skipped_known: usize,
    pub skipped_duplicate: usize,
}

/// Validate raw `(id, url)` pairs.
///
/// Malformed URLs never reach the scheduler; each gets an immediate
/// `Failed(MalformedTarget)` outcome with zero attempts instead.
pub fn validate_targets<I, S, U>(raw: I) -> (Vec<FetchTarget>, Vec<FetchOutcome>)
where
    I: IntoIterator<Item = (S, U)>,
    S: Into<String>,
    U: Into<String>,
{
    let mut targets = Vec::new();
    let mut rejected = Vec::new();
    for (id, url) in raw {
        let (id, url) = (id.into(), url.into());
        match FetchTarget::new(id.clone(), url.clone()) {
            Ok(target) => targets.push(target),
            Err(e) => {
                warn!("Rejecting target {url:?}: {e}");
                rejected.push(FetchOutcome::failed(FetchTarget::unchecked(id, url), &e, 0));
            }
        }
    }
    (targets, rejected)
}

/// Runs [`FetchTask`]s with at most `concurrency` in flight.
pub struct ConcurrentScheduler<E: RenderEngine> {
    task: FetchTask<E>,
    known: HashSet<String>,
}

impl<E: RenderEngine> ConcurrentScheduler<E> {
    /// `known` holds identities already present in the prior snapshot.
    pub fn new(task: FetchTask<E>, known: impl IntoIterator<Item = String>) -> Self {
        Self {
            task,
            known: known.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn task(&self) -> &FetchTask<E> {
        &self.task
    }

    #[must_use]
    pub fn is_known(&self, identity: &str) -> bool {
        self.known.contains(identity)
    }

    /// Drop targets whose identity is known or already seen in this batch.
    ///
    /// Targets without an identity are always scheduled; each then fails on
    /// its own as `MissingIdentity`.
    #[must_use]
    pub fn filter(&self, targets: Vec<FetchTarget>) -> FilteredTargets {
        let key = self.task.identity_key();
        let mut seen = HashSet::new();
        let mut filtered = FilteredTargets::default();

        for target in targets {
            let identity = target.identity(key);
            if identity.is_empty() {
                filtered.scheduled.push(target);
            } else if self.known.contains(identity) {
                debug!("Skipping known target {target}");
                filtered.skipped_known += 1;
            } else if !seen.insert(identity.to_string()) {
                debug!("Skipping repeated target {target}");
                filtered.skipped_duplicate += 1;
            } else {
                filtered.scheduled.push(target);
            }
        }
        filtered
    }

    /// Filter, then dispatch. One outcome per scheduled target, completion order.
    pub async fn run(&self, targets: Vec<FetchTarget>, concurrency: usize) -> Vec<FetchOutcome> {
        let filtered = self.filter(targets);
        if filtered.skipped_known + filtered.skipped_duplicate > 0 {
            info!(
                "Skipped {} known and {} repeated targets",
                filtered.skipped_known, filtered.skipped_duplicate
            );
        }
        self.dispatch(filtered.scheduled, concurrency).await
    }

    /// Run every target as-is. One failed or panicked task never stops the batch.
    pub async fn dispatch(
        &self,
        targets: Vec<FetchTarget>,
        concurrency: usize,
    ) -> Vec<FetchOutcome> {
        let concurrency = concurrency.clamp(1, crate::utils::MAX_CONCURRENCY);
        let total = targets.len();
        info!("Dispatching {total} targets with concurrency {concurrency}");

        let metrics = self.task.metrics().clone();
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut active = FuturesUnordered::new();
        let mut outcomes = Vec::with_capacity(total);

        for target in targets {
            metrics.increment_scheduled();

            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                error!("Semaphore closed unexpectedly");
                metrics.increment_failed();
                let reason = FetchError::Internal("scheduler semaphore closed".to_string());
                outcomes.push(FetchOutcome::failed(target, &reason, 0));
                continue;
            };

            let task = self.task.clone();
            let spawned = target.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit; // Hold until task completes
                task.run(spawned).await
            });
            active.push(async move { (target, handle.await) });
        }

        while let Some((target, joined)) = active.next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Fetch task for {target} panicked: {e}");
                    metrics.increment_failed();
                    let reason = FetchError::Internal(format!("fetch task panicked: {e}"));
                    FetchOutcome::failed(target, &reason, 0)
                }
            };

            match &outcome {
                FetchOutcome::Success { target, .. } => debug!("Completed {target}"),
                FetchOutcome::Failed {
                    target,
                    kind,
                    last_error,
                    ..
                } => warn!("Failed {target} ({kind}): {last_error}"),
            }
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!("Batch finished: {succeeded}/{total} succeeded");
        outcomes
    }
}
