//! Runtime view of the fleet
//!
//! A [`Host`] wraps the manifest entry with facts observed during the run.
//! Facts are write-once: the first observation sticks and a conflicting
//! second one is an error. The registry also caches one connection per
//! host and re-opens it lazily once it has been closed.

use dashmap::DashMap;
use kubeprep_config::{Cluster, HostConfig};
use kubeprep_core::{Error, OperatingSystem, Result};
use kubeprep_ssh::{Connection, Connector};
use once_cell::sync::OnceCell;
use std::fmt::Debug;
use std::sync::Arc;

#[derive(Debug)]
pub struct Host {
    pub config: HostConfig,
    os: OnceCell<OperatingSystem>,
    initialized: OnceCell<bool>,
    encryption_config: OnceCell<Option<String>>,
}

impl Host {
    pub fn new(config: HostConfig) -> Self {
        let os = OnceCell::new();
        if config.operating_system != OperatingSystem::Unknown {
            // Declared in the manifest: detection is skipped.
            let _ = os.set(config.operating_system);
        }
        Self {
            config,
            os,
            initialized: OnceCell::new(),
            encryption_config: OnceCell::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.config.id
    }

    /// `id/address`, used in logs and error messages
    pub fn identity(&self) -> String {
        self.config.identity()
    }

    /// Resolved operating system; `Unknown` until facts are gathered
    pub fn os(&self) -> OperatingSystem {
        self.os.get().copied().unwrap_or_default()
    }

    pub fn os_resolved(&self) -> bool {
        self.os.get().is_some()
    }

    pub fn set_os(&self, os: OperatingSystem) -> Result<()> {
        set_once(&self.os, os, self, "operating system")
    }

    /// Whether the host already ran a kubelet before this run
    pub fn initialized(&self) -> bool {
        self.initialized.get().copied().unwrap_or(false)
    }

    pub fn set_initialized(&self, initialized: bool) -> Result<()> {
        set_once(&self.initialized, initialized, self, "initialized state")
    }

    /// Name of an encryption providers configuration already live on the host
    pub fn encryption_config(&self) -> Option<&str> {
        self.encryption_config.get().and_then(|name| name.as_deref())
    }

    pub fn set_encryption_config(&self, name: Option<String>) -> Result<()> {
        set_once(&self.encryption_config, name, self, "encryption config")
    }
}

fn set_once<T: PartialEq + Debug>(cell: &OnceCell<T>, value: T, host: &Host, fact: &str) -> Result<()> {
    match cell.try_insert(value) {
        Ok(_) => Ok(()),
        Err((current, value)) if *current == value => Ok(()),
        Err((current, value)) => Err(Error::configuration(format!(
            "{fact} of host {} is already {current:?}, refusing to change it to {value:?}",
            host.identity()
        ))),
    }
}

pub struct HostRegistry {
    hosts: Vec<Arc<Host>>,
    connector: Arc<dyn Connector>,
    connections: DashMap<u32, Arc<dyn Connection>>,
}

impl HostRegistry {
    /// Control plane hosts first, then static workers, each in manifest order
    pub fn new(cluster: &Cluster, connector: Arc<dyn Connector>) -> Self {
        Self {
            hosts: cluster
                .hosts()
                .map(|config| Arc::new(Host::new(config.clone())))
                .collect(),
            connector,
            connections: DashMap::new(),
        }
    }

    pub fn hosts(&self) -> &[Arc<Host>] {
        &self.hosts
    }

    pub fn control_plane(&self) -> impl Iterator<Item = &Arc<Host>> {
        self.hosts.iter().filter(|host| host.config.is_control_plane())
    }

    pub fn get(&self, id: u32) -> Option<&Arc<Host>> {
        self.hosts.iter().find(|host| host.id() == id)
    }

    /// The cached connection to `host`, opening a new one when there is
    /// none or the cached one has been closed
    pub async fn connection(&self, host: &Host) -> Result<Arc<dyn Connection>> {
        let cached = self
            .connections
            .get(&host.id())
            .map(|entry| Arc::clone(entry.value()));
        if let Some(conn) = cached {
            if !conn.is_closed() {
                return Ok(conn);
            }
            tracing::debug!(host = %host.identity(), "Cached connection is closed, reconnecting");
        }

        let conn = self.connector.connect(&host.config).await?;
        self.connections.insert(host.id(), Arc::clone(&conn));
        Ok(conn)
    }

    /// Close the connection to `host` and forget it
    pub async fn close_connection(&self, host_id: u32) -> Result<()> {
        if let Some((_, conn)) = self.connections.remove(&host_id) {
            conn.close().await?;
        }
        Ok(())
    }

    pub async fn close_all(&self) {
        let ids: Vec<u32> = self.connections.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Err(e) = self.close_connection(id).await {
                tracing::debug!(host = id, error = %e, "Failed to close connection");
            }
        }
    }

    pub fn is_connected(&self, host_id: u32) -> bool {
        self.connections
            .get(&host_id)
            .is_some_and(|conn| !conn.is_closed())
    }
}
