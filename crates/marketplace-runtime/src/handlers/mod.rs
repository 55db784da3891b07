//! # Runtime Handlers
//!
//! Long-running tasks spawned by [`crate::MarketplaceRuntime`]. Each one
//! exits when its shutdown receiver flips to `true`.

pub mod dispatch;
pub mod notifications;
pub mod scheduler;

pub use dispatch::DispatchHandler;
pub use notifications::NotificationLogger;
pub use scheduler::SchedulerHandler;
