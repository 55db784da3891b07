//! # Domain Module

pub mod errors;
pub mod policy;
pub mod value_objects;

pub use errors::*;
pub use policy::*;
pub use value_objects::*;
