//! # Routing Worker Pool
//!
//! N workers pull lead ids from one bounded channel. Each lead is routed in
//! its own task, so a panic or error is contained to that lead. Transient
//! failures are re-submitted after exponential backoff.
//!
//! ```text
//! submit ─→ [mpsc] ─→ worker 0..N ─→ spawn(route) ─→ stats
//!    ↑                                   │
//!    └──── sleep(backoff) ←─ Retrying ───┘
//! ```

use parking_lot::Mutex;
use serde::Serialize;
use shared_types::entities::{LeadId, LeadStatus, WorkerId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::RoutingConfig;
use crate::domain::{RoutingError, RoutingOutcome};
use crate::ports::LeadRoutingApi;

/// Snapshot of pool counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub submitted: u64,
    pub routed: u64,
    pub partial: u64,
    pub matches_created: u64,
    pub skipped: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub failed: u64,
    pub panicked: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    routed: AtomicU64,
    partial: AtomicU64,
    matches_created: AtomicU64,
    skipped: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record(&self, outcome: &RoutingOutcome) {
        match outcome {
            RoutingOutcome::Completed(report) => {
                if report.status == LeadStatus::Routed {
                    Self::bump(&self.routed);
                } else {
                    Self::bump(&self.partial);
                }
                self.matches_created
                    .fetch_add(u64::from(report.matches_created), Ordering::Relaxed);
            }
            RoutingOutcome::Skipped(_) => Self::bump(&self.skipped),
            RoutingOutcome::Retrying { .. } => Self::bump(&self.retried),
            RoutingOutcome::DeadLettered { .. } => Self::bump(&self.dead_lettered),
        }
    }

    fn snapshot(&self) -> PoolStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        PoolStats {
            submitted: load(&self.submitted),
            routed: load(&self.routed),
            partial: load(&self.partial),
            matches_created: load(&self.matches_created),
            skipped: load(&self.skipped),
            retried: load(&self.retried),
            dead_lettered: load(&self.dead_lettered),
            failed: load(&self.failed),
            panicked: load(&self.panicked),
        }
    }
}

/// State shared by the pool handle, its workers, and retry timers.
struct Shared {
    sender: mpsc::Sender<LeadId>,
    in_flight: Mutex<HashSet<LeadId>>,
    pending_retries: AtomicUsize,
    closed: AtomicBool,
    counters: Counters,
}

impl Shared {
    async fn submit(&self, lead_id: LeadId) -> bool {
        if self.closed.load(Ordering::SeqCst) || !self.in_flight.lock().insert(lead_id) {
            return false;
        }
        if self.sender.send(lead_id).await.is_err() {
            self.in_flight.lock().remove(&lead_id);
            return false;
        }
        Counters::bump(&self.counters.submitted);
        true
    }
}

/// Pool of routing workers.
pub struct RoutingWorkerPool {
    shared: Arc<Shared>,
    api: Arc<dyn LeadRoutingApi>,
    shutdown_tx: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl RoutingWorkerPool {
    /// Spawns `config.workers` workers on the current runtime.
    pub fn start(api: Arc<dyn LeadRoutingApi>, config: RoutingConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            sender,
            in_flight: Mutex::new(HashSet::new()),
            pending_retries: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            counters: Counters::default(),
        });
        let config = Arc::new(config);

        let workers = (0..config.workers.max(1))
            .map(|index| {
                let worker = Worker {
                    id: WorkerId::new(format!("{}-{index}", config.worker_prefix)),
                    api: api.clone(),
                    shared: shared.clone(),
                    receiver: receiver.clone(),
                    shutdown: shutdown_rx.clone(),
                    config: config.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        info!(workers = config.workers.max(1), "Routing worker pool started");
        Self {
            shared,
            api,
            shutdown_tx,
            workers: Mutex::new(workers),
        }
    }

    /// Queues a lead for routing. Returns `false` if it is already queued
    /// or running, or the pool is shut down.
    pub async fn submit(&self, lead_id: LeadId) -> bool {
        self.shared.submit(lead_id).await
    }

    /// Submits the oldest pending queue entries.
    pub async fn dispatch_pending(&self, limit: usize) -> Result<usize, RoutingError> {
        let mut submitted = 0;
        for lead_id in self.api.pending_leads(limit).await? {
            if self.submit(lead_id).await {
                submitted += 1;
            }
        }
        if submitted > 0 {
            debug!(count = submitted, "Dispatched pending leads");
        }
        Ok(submitted)
    }

    /// Re-submits leads whose routing lease expired.
    pub async fn sweep_stale_leases(&self) -> Result<usize, RoutingError> {
        let mut submitted = 0;
        for lead_id in self.api.reclaimable_leads().await? {
            if self.submit(lead_id).await {
                submitted += 1;
            }
        }
        if submitted > 0 {
            info!(count = submitted, "Reclaimed leads with expired leases");
        }
        Ok(submitted)
    }

    pub fn stats(&self) -> PoolStats {
        self.shared.counters.snapshot()
    }

    /// Leads queued or being routed.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.lock().len()
    }

    /// Waits until nothing is queued, running, or waiting on a retry timer.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.in_flight() == 0 && self.shared.pending_retries.load(Ordering::SeqCst) == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Stops accepting work and waits for workers to finish their current lead.
    pub async fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        if self.shutdown_tx.send(true).is_err() {
            debug!("Workers already stopped");
        }
        let handles: Vec<_> = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Routing worker exited abnormally");
            }
        }
        info!("Routing worker pool stopped");
    }
}

struct Worker {
    id: WorkerId,
    api: Arc<dyn LeadRoutingApi>,
    shared: Arc<Shared>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<LeadId>>>,
    shutdown: watch::Receiver<bool>,
    config: Arc<RoutingConfig>,
}

impl Worker {
    async fn run(mut self) {
        debug!(worker = %self.id, "Routing worker started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            let next = {
                let mut receiver = self.receiver.lock().await;
                tokio::select! {
                    biased;
                    _ = self.shutdown.changed() => None,
                    lead = receiver.recv() => lead,
                }
            };
            let Some(lead_id) = next else { break };
            self.process(lead_id).await;
        }
        debug!(worker = %self.id, "Routing worker stopped");
    }

    async fn process(&self, lead_id: LeadId) {
        let api = self.api.clone();
        let worker = self.id.clone();
        let result = tokio::spawn(async move { api.route(lead_id, &worker).await }).await;

        // Count the retry before leaving the in-flight set so the pool never looks idle in between
        let retry = match &result {
            Ok(Ok(RoutingOutcome::Retrying { attempts, .. })) => Some(*attempts),
            _ => None,
        };
        if retry.is_some() {
            self.shared.pending_retries.fetch_add(1, Ordering::SeqCst);
        }
        self.shared.in_flight.lock().remove(&lead_id);

        match result {
            Ok(Ok(outcome)) => {
                self.shared.counters.record(&outcome);
                if let Some(attempts) = retry {
                    self.schedule_retry(lead_id, attempts);
                }
            }
            Ok(Err(e)) => {
                Counters::bump(&self.shared.counters.failed);
                error!(lead_id = %lead_id, worker = %self.id, kind = %e.kind(), error = %e, "Routing failed");
            }
            Err(e) => {
                Counters::bump(&self.shared.counters.panicked);
                error!(lead_id = %lead_id, worker = %self.id, error = %e, "Routing task panicked");
            }
        }
    }

    fn schedule_retry(&self, lead_id: LeadId, attempts: u32) {
        let delay = self.config.backoff_ms(attempts);
        let shared = self.shared.clone();
        let mut shutdown = self.shutdown.clone();
        debug!(lead_id = %lead_id, attempts, delay_ms = delay, "Retry scheduled");

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(delay)) => {
                    if !shared.submit(lead_id).await {
                        warn!(lead_id = %lead_id, "Retry not submitted");
                    }
                }
                _ = shutdown.changed() => {}
            }
            shared.pending_retries.fetch_sub(1, Ordering::SeqCst);
        });
    }
}
