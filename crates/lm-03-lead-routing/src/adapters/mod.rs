//! # Adapters Module

pub mod tenant_policy;

pub use tenant_policy::ConfigTenantPolicy;
