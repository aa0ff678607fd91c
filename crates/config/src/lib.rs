//! Cluster manifest handling for kubeprep
//!
//! This crate owns the serde model of the cluster manifest and the loader
//! that reads, resolves and validates it before a run starts.

pub mod cluster;
pub mod loader;

pub use cluster::*;
pub use loader::*;
