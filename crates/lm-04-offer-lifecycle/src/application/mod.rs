//! # Application Module

mod follow_up;
pub mod desk;
pub mod scheduler;

pub use desk::OfferDesk;
pub use scheduler::OfferScheduler;
