//! # Shared Bus - Marketplace Event Bus
//!
//! Fire-and-forget event fan-out between the engine and its external
//! collaborators. The Notification Dispatcher, dashboards, and audit sinks
//! are all just subscribers.
//!
//! ```text
//! ┌──────────────┐                    ┌────────────────────────┐
//! │ Lead Routing │    publish()       │ Notification Dispatcher│
//! │ Offer Sweep  │ ──────┐            │ (external)             │
//! │ Offer Desk   │       │            └────────────────────────┘
//! └──────────────┘       ▼                    ↑
//!                  ┌──────────────┐           │
//!                  │  Event Bus   │ ──────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! Publishing never blocks and never fails: with no subscribers an event is
//! simply dropped.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EventFilter, EventTopic, MarketplaceEvent, OfferSnapshot};
pub use publisher::{EventPublisher, InMemoryEventBus, NoopPublisher};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before the slowest one lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
