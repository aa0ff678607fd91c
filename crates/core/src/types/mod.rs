//! Core domain types for `kubeprep`.
//!
//! - **`os`**: the closed set of operating systems a host can run and the
//!   distribution families they belong to

pub mod os;

pub use os::*;
