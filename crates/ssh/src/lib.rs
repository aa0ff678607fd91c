//! Remote connections for kubeprep
//!
//! A [`Connection`] is one open channel to one host. Connections are created
//! by a [`Connector`]; production code uses [`SshConnector`], which drives the
//! system OpenSSH client, and tests use the in-memory
//! [`testing::FakeConnector`].

pub mod connection;
pub mod openssh;
pub mod testing;

pub use connection::*;
pub use openssh::*;
