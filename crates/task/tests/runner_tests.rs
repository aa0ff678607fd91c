use async_trait::async_trait;
use kubeprep_core::{Error, OperatingSystem, Result};
use kubeprep_ssh::testing::FakeConnector;
use kubeprep_ssh::Connection;
use kubeprep_task::{run_on_all_hosts, run_on_hosts, Host, HostTask, RunContext, RunMode};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{cluster, context, control_plane, worker};

/// Runs `step <id>` on every host
struct Step;

#[async_trait]
impl HostTask for Step {
    fn name(&self) -> &str {
        "step"
    }

    async fn run(&self, _ctx: &RunContext, host: &Host, conn: &dyn Connection) -> Result<()> {
        conn.run_raw(&format!("step {}", host.id())).await?;
        Ok(())
    }
}

struct PanicsOn(u32);

#[async_trait]
impl HostTask for PanicsOn {
    fn name(&self) -> &str {
        "panicky"
    }

    async fn run(&self, _ctx: &RunContext, host: &Host, conn: &dyn Connection) -> Result<()> {
        if host.id() == self.0 {
            panic!("host {} blew up", host.id());
        }
        conn.run_raw("step").await?;
        Ok(())
    }
}

fn fleet(size: u32) -> kubeprep_config::Cluster {
    let control: Vec<_> = (1..=size.min(2))
        .map(|id| control_plane(id, OperatingSystem::Ubuntu))
        .collect();
    let workers: Vec<_> = (3..=size)
        .map(|id| worker(id, OperatingSystem::Debian))
        .collect();
    cluster(control, workers)
}

#[tokio::test]
async fn sequential_run_stops_at_first_failure() {
    let fake = FakeConnector::new();
    fake.fail(2, "step", "disk full");
    let ctx = context(fleet(3), &fake);

    let err = run_on_all_hosts(&ctx, Arc::new(Step), RunMode::Sequential)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Host { .. }));
    assert_eq!(err.failed_hosts(), vec!["2/10.0.0.2"]);
    assert!(err.to_string().contains("step failed on host 2/10.0.0.2"));
    assert!(err.to_string().contains("disk full"));
    assert_eq!(fake.touched_hosts(), vec![1, 2]);
    assert!(fake.scripts(3).is_empty());
}

#[tokio::test]
async fn sequential_run_follows_registry_order() {
    let fake = FakeConnector::new();
    let ctx = context(fleet(4), &fake);

    run_on_all_hosts(&ctx, Arc::new(Step), RunMode::Sequential)
        .await
        .unwrap();

    let order: Vec<u32> = fake
        .events()
        .iter()
        .filter(|e| matches!(e, kubeprep_ssh::testing::FakeEvent::Script { .. }))
        .map(|e| e.host())
        .collect();
    assert_eq!(order, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn concurrent_run_reports_every_failing_host() {
    let fake = FakeConnector::new();
    fake.fail(1, "step", "first");
    fake.fail(3, "step", "third");
    let ctx = context(fleet(4), &fake);

    let err = run_on_all_hosts(&ctx, Arc::new(Step), RunMode::Concurrent)
        .await
        .unwrap_err();

    let Error::Aggregate { task, failures } = &err else {
        panic!("expected aggregate error, got {err}");
    };
    assert_eq!(task, "step");
    assert_eq!(err.failed_hosts(), vec!["1/10.0.0.1", "3/10.0.0.3"]);
    assert!(failures[0].error.to_string().contains("first"));
    assert!(failures[1].error.to_string().contains("third"));

    for host in 1..=4 {
        assert_eq!(fake.scripts(host), vec![format!("step {host}")]);
    }
}

#[tokio::test]
async fn concurrent_run_waits_for_slow_hosts() {
    let fake = FakeConnector::new();
    fake.delay(2, Duration::from_millis(50));
    fake.fail(1, "step", "fast failure");
    let ctx = context(fleet(2), &fake);

    let err = run_on_all_hosts(&ctx, Arc::new(Step), RunMode::Concurrent)
        .await
        .unwrap_err();

    assert_eq!(err.failed_hosts(), vec!["1/10.0.0.1"]);
    assert_eq!(fake.scripts(2), vec!["step 2"]);
}

#[tokio::test]
async fn panicking_host_is_reported_as_that_hosts_failure() {
    let fake = FakeConnector::new();
    let ctx = context(fleet(3), &fake);

    let err = run_on_all_hosts(&ctx, Arc::new(PanicsOn(2)), RunMode::Concurrent)
        .await
        .unwrap_err();

    assert_eq!(err.failed_hosts(), vec!["2/10.0.0.2"]);
    assert!(err.to_string().contains("host 2 blew up"));
    assert_eq!(fake.scripts(1).len(), 1);
    assert_eq!(fake.scripts(3).len(), 1);
}

#[tokio::test]
async fn unreachable_host_fails_without_affecting_others() {
    let fake = FakeConnector::new();
    fake.refuse_connections(2);
    let ctx = context(fleet(3), &fake);

    let err = run_on_all_hosts(&ctx, Arc::new(Step), RunMode::Concurrent)
        .await
        .unwrap_err();

    assert_eq!(err.failed_hosts(), vec!["2/10.0.0.2"]);
    assert!(err.is_transport() || err.to_string().contains("connection refused"));
    assert_eq!(fake.touched_hosts(), vec![1, 3]);
}

#[tokio::test]
async fn subset_runs_only_touch_chosen_hosts() {
    let fake = FakeConnector::new();
    let ctx = context(fleet(3), &fake);
    let control_plane: Vec<_> = ctx.registry.control_plane().cloned().collect();

    run_on_hosts(&ctx, control_plane, Arc::new(Step), RunMode::Concurrent)
        .await
        .unwrap();

    assert_eq!(fake.touched_hosts(), vec![1, 2]);
}

#[tokio::test]
async fn connections_are_reused_across_tasks() {
    let fake = FakeConnector::new();
    let ctx = context(fleet(2), &fake);

    run_on_all_hosts(&ctx, Arc::new(Step), RunMode::Concurrent)
        .await
        .unwrap();
    run_on_all_hosts(&ctx, Arc::new(Step), RunMode::Sequential)
        .await
        .unwrap();

    assert_eq!(fake.connect_count(1), 1);
    assert_eq!(fake.connect_count(2), 1);
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn concurrent_mode_runs_everywhere_and_reports_exactly_the_failures(
        failing in prop::collection::vec(any::<bool>(), 1..6)
    ) {
        let fake = FakeConnector::new();
        for (index, fails) in failing.iter().enumerate() {
            if *fails {
                fake.fail(index as u32 + 1, "step", "boom");
            }
        }
        let ctx = context(fleet(failing.len() as u32), &fake);

        let result = block_on(run_on_all_hosts(&ctx, Arc::new(Step), RunMode::Concurrent));

        let expected: Vec<String> = failing
            .iter()
            .enumerate()
            .filter(|(_, fails)| **fails)
            .map(|(index, _)| format!("{}/10.0.0.{}", index + 1, index + 1))
            .collect();
        match result {
            Ok(()) => prop_assert!(expected.is_empty()),
            Err(err) => prop_assert_eq!(err.failed_hosts(), expected.iter().map(String::as_str).collect::<Vec<_>>()),
        }
        for index in 0..failing.len() {
            prop_assert_eq!(fake.scripts(index as u32 + 1).len(), 1);
        }
    }

    #[test]
    fn sequential_mode_never_runs_past_the_first_failure(
        failing in prop::collection::vec(any::<bool>(), 1..6)
    ) {
        let fake = FakeConnector::new();
        for (index, fails) in failing.iter().enumerate() {
            if *fails {
                fake.fail(index as u32 + 1, "step", "boom");
            }
        }
        let ctx = context(fleet(failing.len() as u32), &fake);

        let result = block_on(run_on_all_hosts(&ctx, Arc::new(Step), RunMode::Sequential));

        let first_failure = failing.iter().position(|fails| *fails);
        prop_assert_eq!(result.is_err(), first_failure.is_some());
        let last_attempted = first_failure.unwrap_or(failing.len() - 1);
        for index in 0..failing.len() {
            let attempted = fake.scripts(index as u32 + 1).len();
            prop_assert_eq!(attempted, usize::from(index <= last_attempted));
        }
    }
}
