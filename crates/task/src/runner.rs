//! Run one task across many hosts
//!
//! Sequential mode walks the hosts in registry order and stops at the first
//! failure. Concurrent mode spawns one execution per host, lets every host
//! finish, and merges the failures into a single aggregate error.

use crate::registry::Host;
use crate::state::RunContext;
use async_trait::async_trait;
use futures::FutureExt;
use kubeprep_core::{Error, HostFailure, Result};
use kubeprep_ssh::Connection;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::Instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Sequential,
    Concurrent,
}

/// A unit of work executed against one host at a time
#[async_trait]
pub trait HostTask: Send + Sync {
    /// Human readable name used in logs and errors
    fn name(&self) -> &str;

    async fn run(&self, ctx: &RunContext, host: &Host, conn: &dyn Connection) -> Result<()>;
}

pub async fn run_on_all_hosts(
    ctx: &Arc<RunContext>,
    task: Arc<dyn HostTask>,
    mode: RunMode,
) -> Result<()> {
    let hosts = ctx.registry.hosts().to_vec();
    run_on_hosts(ctx, hosts, task, mode).await
}

pub async fn run_on_hosts(
    ctx: &Arc<RunContext>,
    hosts: Vec<Arc<Host>>,
    task: Arc<dyn HostTask>,
    mode: RunMode,
) -> Result<()> {
    match mode {
        RunMode::Sequential => run_sequential(ctx, hosts, task).await,
        RunMode::Concurrent => run_concurrent(ctx, hosts, task).await,
    }
}

async fn run_sequential(
    ctx: &Arc<RunContext>,
    hosts: Vec<Arc<Host>>,
    task: Arc<dyn HostTask>,
) -> Result<()> {
    for host in hosts {
        let span = host_span(task.as_ref(), &host);
        run_on_host(ctx, &host, task.as_ref())
            .instrument(span)
            .await
            .map_err(|e| Error::host(task.name(), host.identity(), e))?;
    }
    Ok(())
}

async fn run_concurrent(
    ctx: &Arc<RunContext>,
    hosts: Vec<Arc<Host>>,
    task: Arc<dyn HostTask>,
) -> Result<()> {
    let mut join_set = JoinSet::new();

    for (slot, host) in hosts.iter().enumerate() {
        let ctx = Arc::clone(ctx);
        let host = Arc::clone(host);
        let task = Arc::clone(&task);
        let span = host_span(task.as_ref(), &host);

        join_set.spawn(
            async move {
                let result = AssertUnwindSafe(run_on_host(&ctx, &host, task.as_ref()))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(panicked(panic.as_ref())));
                (slot, result)
            }
            .instrument(span),
        );
    }

    let mut results: Vec<Option<Result<()>>> = hosts.iter().map(|_| None).collect();
    let mut lost = None;
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((slot, result)) => results[slot] = Some(result),
            Err(e) => {
                tracing::error!(error = %e, "Host execution was lost");
                lost = Some(e.to_string());
            }
        }
    }

    let identities = hosts.iter().map(|host| host.identity());
    let failures = collect_failures(identities, results, lost.as_deref());

    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Aggregate {
            task: task.name().to_string(),
            failures,
        })
    }
}

/// Pair each slot with its host. A slot that never reported is a failure.
fn collect_failures(
    identities: impl Iterator<Item = String>,
    results: Vec<Option<Result<()>>>,
    lost: Option<&str>,
) -> Vec<HostFailure> {
    identities
        .zip(results)
        .filter_map(|(host, result)| match result {
            Some(Ok(())) => None,
            Some(Err(error)) => Some(HostFailure { host, error }),
            None => Some(HostFailure {
                host,
                error: Error::configuration(match lost {
                    Some(cause) => format!("host execution was lost: {cause}"),
                    None => "host execution did not report a result".to_string(),
                }),
            }),
        })
        .collect()
}

async fn run_on_host(ctx: &RunContext, host: &Host, task: &dyn HostTask) -> Result<()> {
    let conn = ctx.registry.connection(host).await?;
    tracing::debug!("Running task");
    task.run(ctx, host, conn.as_ref()).await
}

fn host_span(task: &dyn HostTask, host: &Host) -> tracing::Span {
    tracing::info_span!(
        "host",
        task = task.name(),
        host = host.id(),
        address = %host.config.public_address,
        os = %host.os(),
    )
}

fn panicked(panic: &(dyn std::any::Any + Send)) -> Error {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    Error::configuration(format!("host execution panicked: {message}"))
}
