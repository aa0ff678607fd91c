//! Shell scripts executed on fleet hosts
//!
//! Every function renders a `{{ .NAME }}` template into a script ready for
//! `Connection::run_raw`. Scripts are idempotent: running one twice leaves
//! the host in the same state as running it once.

pub mod configs;
pub mod facts;
pub mod images;
pub mod kubeadm;
pub mod nm_cloud_setup;
pub mod proxy;

pub use configs::*;
pub use facts::*;
pub use images::*;
pub use kubeadm::*;
pub use nm_cloud_setup::*;
pub use proxy::*;
