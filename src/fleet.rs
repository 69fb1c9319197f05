// Fleet fan-out: one spawned worker per host, each bounded by its own deadline.
// A worker that fails, times out or panics is logged and counted; siblings keep running.

use crate::error::Result;
use crate::models::Host;
use futures_util::future::join_all;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// How the workers of one fleet run ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FleetReport {
    pub ok: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub panicked: usize,
}

impl FleetReport {
    pub fn total(&self) -> usize {
        self.ok + self.failed + self.timed_out + self.panicked
    }
}

enum Outcome {
    Ok,
    Failed,
    TimedOut,
}

/// Spawns `worker` for every host and waits until each one finished or hit `deadline`.
pub async fn run_fleet<F, Fut>(task: &str, hosts: Vec<Host>, deadline: Duration, worker: F) -> FleetReport
where
    F: Fn(Host) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let mut handles = Vec::with_capacity(hosts.len());
    for host in hosts {
        let label = format!("{} ({})", host.name, host.ip);
        let work = worker(host);
        let task_name = task.to_string();
        let worker_label = label.clone();
        let handle = tokio::spawn(async move {
            match tokio::time::timeout(deadline, work).await {
                Ok(Ok(())) => Outcome::Ok,
                Ok(Err(e)) => {
                    warn!(task = %task_name, host = %worker_label, kind = e.kind(), error = %e, "worker failed");
                    Outcome::Failed
                }
                Err(_) => {
                    warn!(task = %task_name, host = %worker_label, deadline_secs = deadline.as_secs(), "worker timed out");
                    Outcome::TimedOut
                }
            }
        });
        handles.push((label, handle));
    }

    let joined = join_all(
        handles
            .into_iter()
            .map(|(label, handle)| async move { (label, handle.await) }),
    )
    .await;

    let mut report = FleetReport::default();
    for (label, outcome) in joined {
        match outcome {
            Ok(Outcome::Ok) => report.ok += 1,
            Ok(Outcome::Failed) => report.failed += 1,
            Ok(Outcome::TimedOut) => report.timed_out += 1,
            Err(e) if e.is_panic() => {
                error!(task, host = %label, "worker panicked");
                report.panicked += 1;
            }
            Err(e) => {
                error!(task, host = %label, error = %e, "worker aborted");
                report.failed += 1;
            }
        }
    }
    info!(
        task,
        ok = report.ok,
        failed = report.failed,
        timed_out = report.timed_out,
        panicked = report.panicked,
        "fleet run finished"
    );
    report
}
