//! # Marketplace Runtime
//!
//! Wires the four subsystems over the in-memory store and keeps them
//! moving: routing workers, a dispatch loop over the routing queue, the
//! periodic offer scheduler, and a notification subscriber.
//!
//! ## Task Layout
//!
//! ```text
//!   submit_lead ──→ store + queue ──→ RoutingWorkerPool (N workers)
//!                        ↑                     │
//!   DispatchHandler ─────┘ pending / stale     │ OfferCreated, LeadRouted
//!                                              ▼
//!   SchedulerHandler ──run_once──→ OfferScheduler ──→ InMemoryEventBus ──→ NotificationLogger
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (TOML file + `LM_*` overrides) and validate it
//! 2. Install the tracing subscriber
//! 3. Assemble the container (store, catalog, subsystems, adapters)
//! 4. Start the worker pool and spawn the handlers
//! 5. Wait for Ctrl+C, then shut down cooperatively

#![warn(clippy::all)]

pub mod adapters;
pub mod container;
pub mod handlers;
pub mod logging;

use std::sync::Arc;
use std::time::Duration;

use lm_03_lead_routing::RoutingWorkerPool;
use shared_bus::EventFilter;
use shared_types::entities::{LeadId, LeadRequest};
use shared_types::errors::StoreError;
use shared_types::ports::{LeadRepository, RoutingQueueRepository};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub use container::{ConfigError, LogConfig, MarketplaceContainer, RuntimeConfig};
use handlers::{DispatchHandler, NotificationLogger, SchedulerHandler};

/// The running marketplace.
pub struct MarketplaceRuntime {
    container: Arc<MarketplaceContainer>,
    pool: Arc<RoutingWorkerPool>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl MarketplaceRuntime {
    /// Starts the routing worker pool. Must be called inside a tokio runtime.
    pub fn new(container: MarketplaceContainer) -> Self {
        let container = Arc::new(container);
        let pool = Arc::new(RoutingWorkerPool::start(
            container.routing.clone(),
            container.config.routing.clone(),
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            container,
            pool,
            shutdown_tx,
            shutdown_rx,
            tasks: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Spawns the dispatch loop, the scheduler trigger, and the notification
    /// subscriber.
    pub fn start(&self) {
        let config = &self.container.config;

        let dispatch = DispatchHandler::new(
            self.pool.clone(),
            Duration::from_secs(config.dispatch_interval_secs),
            config.dispatch_batch,
        );
        let scheduler = SchedulerHandler::new(
            self.container.scheduler.clone(),
            Duration::from_secs(config.scheduler_interval_secs),
        );
        let notifications = NotificationLogger::new(
            self.container.event_bus.subscribe(EventFilter::all()),
            self.container.catalog.clone(),
        );

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(dispatch.run(self.shutdown_rx.clone())));
        tasks.push(tokio::spawn(scheduler.run(self.shutdown_rx.clone())));

        let mut notify_shutdown = self.shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            tokio::select! {
                _ = notifications.run() => {}
                _ = notify_shutdown.changed() => {
                    info!("Notification logger stopped");
                }
            }
        }));

        info!(
            workers = config.routing.workers,
            scheduler_interval_secs = config.scheduler_interval_secs,
            dispatch_interval_secs = config.dispatch_interval_secs,
            "Marketplace runtime started"
        );
    }

    /// Stores a new lead, queues it, and hands it to the worker pool.
    pub async fn submit_lead(&self, lead: LeadRequest) -> Result<LeadId, StoreError> {
        let lead_id = lead.id;
        let tenant_id = lead.tenant_id;
        let now = self.container.time_source.now();

        self.container.store.insert_lead(lead).await?;
        self.container.store.enqueue(tenant_id, lead_id, now).await?;
        if !self.pool.submit(lead_id).await {
            // The dispatch loop picks it up from the queue.
            info!(lead_id = %lead_id, "Worker pool busy, lead left on the queue");
        }
        Ok(lead_id)
    }

    /// Waits until the worker pool has nothing queued or running.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        self.pool.wait_idle(timeout).await
    }

    /// Signals every handler, then drains the worker pool.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        let tasks: Vec<_> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Runtime task exited abnormally");
            }
        }
        self.pool.shutdown().await;
        info!("Shutdown complete");
    }

    pub fn container(&self) -> Arc<MarketplaceContainer> {
        Arc::clone(&self.container)
    }

    pub fn pool(&self) -> Arc<RoutingWorkerPool> {
        Arc::clone(&self.pool)
    }
}
