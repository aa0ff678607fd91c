//! In-memory connector for tests
//!
//! [`FakeConnector`] records every script, upload, connect and close per
//! host and answers scripts from a list of rules. It lets pipeline tests
//! assert what would have been sent to each machine without a network.

use crate::connection::{CommandOutput, Connection, Connector};
use async_trait::async_trait;
use kubeprep_config::HostConfig;
use kubeprep_core::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How the fake answers a matching script
#[derive(Debug, Clone)]
pub enum FakeReply {
    /// Exit 0 with the given stdout
    Ok(String),
    /// Exit non-zero with the given stderr
    Fail { exit_code: i32, stderr: String },
    /// Drop the connection mid-command, as a rebooting host does
    Disconnect,
}

/// Something that happened on a fake host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    Connect { host: u32 },
    Script { host: u32, script: String },
    Upload { host: u32, path: String, content: Vec<u8> },
    Close { host: u32 },
}

impl FakeEvent {
    pub fn host(&self) -> u32 {
        match self {
            FakeEvent::Connect { host }
            | FakeEvent::Script { host, .. }
            | FakeEvent::Upload { host, .. }
            | FakeEvent::Close { host } => *host,
        }
    }
}

struct Rule {
    host: Option<u32>,
    needle: String,
    reply: FakeReply,
}

#[derive(Default)]
struct FakeState {
    rules: Vec<Rule>,
    refuse_connect: Vec<u32>,
    delays: HashMap<u32, Duration>,
    events: Vec<FakeEvent>,
}

/// Connector whose hosts live in memory
#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<FakeState>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        // A panicking test thread must not hide the events of the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reply to scripts containing `needle`, on `host` or on every host.
    ///
    /// Rules are checked in insertion order; unmatched scripts succeed with
    /// empty output.
    pub fn respond(&self, host: Option<u32>, needle: impl Into<String>, reply: FakeReply) -> &Self {
        self.lock().rules.push(Rule {
            host,
            needle: needle.into(),
            reply,
        });
        self
    }

    /// Fail scripts containing `needle` on `host` with exit code 1
    pub fn fail(&self, host: u32, needle: impl Into<String>, stderr: impl Into<String>) -> &Self {
        self.respond(
            Some(host),
            needle,
            FakeReply::Fail {
                exit_code: 1,
                stderr: stderr.into(),
            },
        )
    }

    /// Make connection attempts to `host` fail
    pub fn refuse_connections(&self, host: u32) -> &Self {
        self.lock().refuse_connect.push(host);
        self
    }

    /// Delay every script on `host`
    pub fn delay(&self, host: u32, delay: Duration) -> &Self {
        self.lock().delays.insert(host, delay);
        self
    }

    /// Every event, in the order it happened
    pub fn events(&self) -> Vec<FakeEvent> {
        self.lock().events.clone()
    }

    /// Scripts executed on `host`, in order
    pub fn scripts(&self, host: u32) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match event {
                FakeEvent::Script { host: h, script } if *h == host => Some(script.clone()),
                _ => None,
            })
            .collect()
    }

    /// Files uploaded to `host`, keyed by remote path
    pub fn uploads(&self, host: u32) -> HashMap<String, Vec<u8>> {
        self.lock()
            .events
            .iter()
            .filter_map(|event| match event {
                FakeEvent::Upload {
                    host: h,
                    path,
                    content,
                } if *h == host => Some((path.clone(), content.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn connect_count(&self, host: u32) -> usize {
        self.count(|e| matches!(e, FakeEvent::Connect { host: h } if *h == host))
    }

    pub fn close_count(&self, host: u32) -> usize {
        self.count(|e| matches!(e, FakeEvent::Close { host: h } if *h == host))
    }

    /// Hosts that saw at least one event
    pub fn touched_hosts(&self) -> Vec<u32> {
        let mut hosts: Vec<u32> = self.lock().events.iter().map(FakeEvent::host).collect();
        hosts.sort_unstable();
        hosts.dedup();
        hosts
    }

    fn count(&self, predicate: impl Fn(&FakeEvent) -> bool) -> usize {
        self.lock().events.iter().filter(|e| predicate(e)).count()
    }

    fn record(&self, event: FakeEvent) {
        self.lock().events.push(event);
    }

    fn reply_for(&self, host: u32, script: &str) -> (FakeReply, Option<Duration>) {
        let state = self.lock();
        let reply = state
            .rules
            .iter()
            .find(|rule| rule.host.map_or(true, |h| h == host) && script.contains(&rule.needle))
            .map(|rule| rule.reply.clone())
            .unwrap_or_else(|| FakeReply::Ok(String::new()));
        (reply, state.delays.get(&host).copied())
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, host: &HostConfig) -> Result<Arc<dyn Connection>> {
        if self.lock().refuse_connect.contains(&host.id) {
            return Err(Error::transport(
                format!("ssh {}", host.public_address),
                "connection refused",
            ));
        }
        self.record(FakeEvent::Connect { host: host.id });
        Ok(Arc::new(FakeConnection {
            host: host.id,
            connector: self.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// A connection to a fake host
pub struct FakeConnection {
    host: u32,
    connector: FakeConnector,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn run_raw(&self, script: &str) -> Result<CommandOutput> {
        if self.is_closed() {
            return Err(Error::transport(script, "connection is closed"));
        }

        self.connector.record(FakeEvent::Script {
            host: self.host,
            script: script.to_string(),
        });

        let (reply, delay) = self.connector.reply_for(self.host, script);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match reply {
            FakeReply::Ok(stdout) => Ok(CommandOutput::ok(stdout)),
            FakeReply::Fail { exit_code, stderr } => {
                Err(Error::command_failed(script, exit_code, stderr))
            }
            FakeReply::Disconnect => {
                self.closed.store(true, Ordering::SeqCst);
                Err(Error::transport(script, "connection reset by peer"))
            }
        }
    }

    async fn upload(&self, path: &str, content: &[u8], _mode: u32) -> Result<()> {
        if self.is_closed() {
            return Err(Error::transport(format!("upload {path}"), "connection is closed"));
        }
        self.connector.record(FakeEvent::Upload {
            host: self.host,
            path: path.to_string(),
            content: content.to_vec(),
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.connector.record(FakeEvent::Close { host: self.host });
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubeprep_core::TemplateVariables;

    #[tokio::test]
    async fn records_scripts_and_applies_rules() {
        let fake = FakeConnector::new();
        fake.fail(1, "apt-get", "E: Unable to locate package");

        let conn = fake.connect(&HostConfig::new(1, "10.0.0.1")).await.unwrap();
        let vars = TemplateVariables::new().with("V", "1.29.4");
        let out = conn.run("echo {{ .V }}", &vars).await.unwrap();
        assert_eq!(out.exit_code, 0);

        let err = conn.run_raw("apt-get install kubeadm").await.unwrap_err();
        assert!(err.to_string().contains("Unable to locate package"));

        assert_eq!(fake.scripts(1), vec!["echo 1.29.4", "apt-get install kubeadm"]);
        assert_eq!(fake.connect_count(1), 1);
    }

    #[tokio::test]
    async fn disconnect_closes_the_connection() {
        let fake = FakeConnector::new();
        fake.respond(None, "reboot", FakeReply::Disconnect);

        let conn = fake.connect(&HostConfig::new(2, "10.0.0.2")).await.unwrap();
        assert!(conn.run_raw("sudo reboot").await.unwrap_err().is_transport());
        assert!(conn.is_closed());
        assert!(conn.run_raw("true").await.is_err());
        assert_eq!(fake.scripts(2), vec!["sudo reboot"]);
    }

    #[tokio::test]
    async fn refused_host_cannot_connect() {
        let fake = FakeConnector::new();
        fake.refuse_connections(3);
        assert!(fake.connect(&HostConfig::new(3, "10.0.0.3")).await.is_err());
        assert_eq!(fake.connect_count(3), 0);
    }
}
