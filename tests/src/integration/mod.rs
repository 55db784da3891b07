//! Integration flows. Each file holds one `#[cfg(test)]` module.

pub mod concurrency;
pub mod lifecycle_flow;
pub mod routing_flow;
