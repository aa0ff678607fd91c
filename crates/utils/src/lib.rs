//! Shared utilities for kubeprep
//!
//! Currently this is the logging setup used by the command line.

pub mod tracing;
