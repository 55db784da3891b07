//! # Application Module

pub mod service;
pub mod worker_pool;

pub use service::LeadRoutingService;
pub use worker_pool::{PoolStats, RoutingWorkerPool};
