//! Core domain types, errors, and constants for `kubeprep`.
//!
//! ## Key Components
//!
//! - **`errors`**: the primary `Error` enum and `Result` alias. Every crate in
//!   the workspace reports failures through it so host and state context can
//!   be layered on without losing the original cause.
//! - **`types`**: the closed set of operating systems a host can run.
//! - **`template`**: `{{ .NAME }}` placeholder rendering for shell scripts and
//!   remote commands.
//! - **`constants`**: remote paths, file names and defaults shared by the
//!   scripts and the pipeline.

pub mod constants;
pub mod errors;
pub mod template;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, HostFailure, Result, ResultExt},
    template::{render, TemplateVariables},
    types::*,
};
