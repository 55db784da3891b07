//! # Domain Module

pub mod entities;
pub mod errors;
pub mod fingerprint;
pub mod log;

pub use entities::*;
pub use errors::*;
pub use fingerprint::*;
pub use log::*;
