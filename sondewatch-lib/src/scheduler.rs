//! Periodic fetch-and-merge loop.
//!
//! One [`Poller`] owns one feed source. Each cycle fetches with a hard
//! timeout, retries with a linear pause, and falls back to the previous good
//! body when every attempt fails. Cycles never overlap: the body cache doubles
//! as the in-flight gate.

use crate::config::{EngineConfig, PollConfig};
use crate::error::SondeError;
use crate::feed::{FeedQuery, FeedSource};
use crate::observer::{StoreObserver, notify};
use crate::record::Normalizer;
use crate::store::{BatchReport, SharedStore};
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of one poll cycle
#[derive(Debug)]
pub enum CycleStatus {
    /// A fresh body was fetched on attempt `attempts`
    Fresh { attempts: u32, report: BatchReport },
    /// Every attempt failed; the previous good body was merged again
    Stale { error: SondeError, report: BatchReport },
    /// Every attempt failed and nothing was cached
    Failed { error: SondeError },
}

impl CycleStatus {
    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            CycleStatus::Fresh { report, .. } | CycleStatus::Stale { report, .. } => Some(report),
            CycleStatus::Failed { .. } => None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, CycleStatus::Fresh { .. })
    }
}

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    source: Arc<dyn FeedSource>,
    store: SharedStore,
    normalizer: Normalizer,
    poll: PollConfig,
    observer: Arc<dyn StoreObserver>,
    last_body: AsyncMutex<Option<String>>,
    running: Mutex<Option<Running>>,
}

/// Restartable polling scheduler; clones share one loop
#[derive(Clone)]
pub struct Poller {
    inner: Arc<Inner>,
}

impl Poller {
    pub fn new(
        source: Arc<dyn FeedSource>,
        store: SharedStore,
        config: &EngineConfig,
        observer: Arc<dyn StoreObserver>,
    ) -> Self {
        let normalizer = Normalizer::new(config.parse.fallback.clone(), config.parse.naive_zone);
        Self {
            inner: Arc::new(Inner {
                source,
                store,
                normalizer,
                poll: config.poll,
                observer,
                last_body: AsyncMutex::new(None),
                running: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.inner.store
    }

    /// Start polling with `filter`, replacing any running loop.
    ///
    /// The first cycle runs immediately, then one per poll interval.
    pub fn start(&self, filter: Option<&str>) {
        let query = FeedQuery::from_filter(filter);
        let token = CancellationToken::new();
        let poller = self.clone();
        let loop_token = token.clone();
        info!(source = %self.inner.source.describe(), %query, "polling started");
        let handle = tokio::spawn(async move { poller.run(query, loop_token).await });

        let previous = self
            .inner
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Running { token, handle });
        if let Some(previous) = previous {
            previous.token.cancel();
        }
    }

    /// Alias of [`Poller::start`] for a filter change
    pub fn restart(&self, filter: Option<&str>) {
        self.start(filter);
    }

    /// Cancel the pending timer; an in-flight cycle still completes
    pub fn stop(&self) {
        if let Some(running) = self.take_running() {
            running.token.cancel();
            info!("polling stopped");
        }
    }

    /// Stop and wait for the loop task to finish
    pub async fn shutdown(&self) {
        if let Some(running) = self.take_running() {
            running.token.cancel();
            if let Err(e) = running.handle.await {
                error!(error = %e, "polling task ended abnormally");
            }
        }
    }

    /// Stop and wait up to `grace` for the loop; abort it after that.
    ///
    /// Returns `false` when the in-flight cycle had to be aborted.
    pub async fn shutdown_within(&self, grace: Duration) -> bool {
        let Some(mut running) = self.take_running() else {
            return true;
        };
        running.token.cancel();
        match timeout(grace, &mut running.handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(error = %e, "polling task ended abnormally");
                true
            }
            Err(_) => {
                warn!(grace_ms = (grace.as_millis() as u64), "in-flight cycle aborted");
                running.handle.abort();
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.token.is_cancelled())
    }

    fn take_running(&self) -> Option<Running> {
        self.inner.running.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    async fn run(&self, query: FeedQuery, token: CancellationToken) {
        let mut ticker = interval(self.inner.poll.interval().max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            // a restart may land while the tick was already due
            if token.is_cancelled() {
                break;
            }
            self.run_cycle(&query).await;
        }
        debug!(%query, "polling loop exited");
    }

    /// Fetch, normalise and merge once.
    pub async fn run_cycle(&self, query: &FeedQuery) -> CycleStatus {
        let inner = &self.inner;
        let mut last_body = inner.last_body.lock().await;

        let mut attempt = 1;
        let error = loop {
            match self.fetch_once(query).await {
                Ok(body) => {
                    let report = self.ingest(&body, query).await;
                    *last_body = Some(body);
                    info!(attempt, updated = report.updated.len(), removed = report.removed.len(), "poll cycle done");
                    let status = CycleStatus::Fresh {
                        attempts: attempt,
                        report,
                    };
                    inner.observer.cycle_finished(&status);
                    return status;
                }
                Err(e) if attempt < inner.poll.max_attempts && e.is_transient() => {
                    let pause = inner.poll.retry_delay(attempt);
                    warn!(attempt, error = %e, retry_in_ms = (pause.as_millis() as u64), "feed fetch failed");
                    sleep(pause).await;
                    attempt += 1;
                }
                Err(e) => break e,
            }
        };

        let status = match last_body.as_deref() {
            Some(body) => {
                warn!(attempts = attempt, error = %error, "feed unavailable, reusing cached body");
                let report = self.ingest(body, query).await;
                CycleStatus::Stale { error, report }
            }
            None => {
                error!(attempts = attempt, error = %error, "feed unavailable and nothing cached");
                CycleStatus::Failed { error }
            }
        };
        inner.observer.cycle_finished(&status);
        status
    }

    async fn fetch_once(&self, query: &FeedQuery) -> Result<String, SondeError> {
        let inner = &self.inner;
        timeout(inner.poll.fetch_timeout(), inner.source.fetch(query)).await?
    }

    async fn ingest(&self, body: &str, query: &FeedQuery) -> BatchReport {
        let inner = &self.inner;
        let batch = inner.normalizer.clone().with_filter(query.filter()).normalize(body);
        let now = Utc::now();
        let observer = inner.observer.as_ref();
        inner
            .store
            .write(|store| {
                let report = match batch {
                    Ok(batch) => store.merge_batch(batch, now),
                    Err(e) => {
                        debug!(error = %e, "feed body carried no data");
                        BatchReport {
                            removed: store.sweep(now),
                            ..Default::default()
                        }
                    }
                };
                notify(observer, store, &report);
                report
            })
            .await
    }
}
