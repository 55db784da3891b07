//! # Domain Module
//!
//! Pure routing logic: no I/O, no clock.

pub mod eligibility;
pub mod errors;
pub mod geo;
pub mod pricing;
pub mod ranking;
pub mod value_objects;

pub use eligibility::*;
pub use errors::*;
pub use geo::*;
pub use pricing::*;
pub use ranking::*;
pub use value_objects::*;
