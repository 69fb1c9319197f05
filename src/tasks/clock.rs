// get_clock: read every OLT's wall clock over the CLI next to the server time.
// All workers feed one channel; the whole fleet lands in a single transaction.

use super::{TaskContext, TaskName};
use crate::error::{PollError, Result};
use crate::fleet::run_fleet;
use crate::models::{CredentialNeed, Host, PollResult, names};
use crate::persist::spawn_result_writer;
use crate::reconciler::Reconciler;
use crate::transport::terminal;
use crate::vendor::{COMMAND_TIMEOUT, ClockReading, Driver, OltDriver};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Device-level index of the clock item.
pub const CLOCK_INDEX: &str = "telnet-show-clock";

/// Stored text value of a clock sample.
#[derive(Debug, Serialize)]
pub struct ClockSample {
    pub olt_format: String,
    pub timestamptz_servidor: String,
    pub timestamptz_olt: String,
}

impl ClockSample {
    pub fn new(reading: &ClockReading, server_now: DateTime<FixedOffset>) -> Self {
        Self {
            olt_format: reading.olt_format.clone(),
            timestamptz_servidor: server_now.to_rfc3339(),
            timestamptz_olt: reading.olt_time.to_rfc3339(),
        }
    }
}

pub async fn run(ctx: &TaskContext) -> anyhow::Result<()> {
    let hosts = ctx.repo.list_pollable_hosts(CredentialNeed::Terminal).await?;
    let (sender, writer) = spawn_result_writer(ctx.repo.pool().clone(), "fleet".into());
    let deadline = ctx.deadlines.for_task(TaskName::GetClock);

    run_fleet("get_clock", hosts, deadline, |host| {
        let ctx = ctx.clone();
        let results = sender.clone();
        async move { poll_clock(&ctx, &host, results).await }
    })
    .await;
    drop(sender);

    match writer.await {
        Ok(Ok(rows)) => info!(task = "get_clock", rows, "clock samples stored"),
        Ok(Err(e)) => warn!(task = "get_clock", error = %e, "clock batch rolled back"),
        Err(e) => warn!(task = "get_clock", error = %e, "clock writer did not finish"),
    }
    Ok(())
}

async fn poll_clock(ctx: &TaskContext, host: &Host, results: mpsc::Sender<PollResult>) -> Result<()> {
    let driver = Driver::for_host(host);
    let script = driver.login_script(&host.telnet_username, &host.telnet_password);
    let mut session = ctx.transport.open_terminal(host, &script).await?;
    let raw = session
        .send(driver.clock_command(), "#", COMMAND_TIMEOUT)
        .await;
    session.close().await;

    let reading = driver.parse_clock(&terminal::normalize(&raw?), ctx.offset)?;
    let sample = ClockSample::new(&reading, Utc::now().with_timezone(&ctx.offset));
    let value = serde_json::to_string(&sample)
        .map_err(|e| PollError::parse(format!("clock sample: {e}")))?;
    debug!(host = %host.name, ip = %host.ip, olt_time = %sample.timestamptz_olt, "clock read");

    let mut reconciler =
        Reconciler::new(host.id, ctx.repo.load_items(host.id, Some(names::CLOCK)).await?);
    let mut tx = ctx.repo.pool().begin().await?;
    let item_id = reconciler.ensure(&mut *tx, CLOCK_INDEX, names::CLOCK).await?;
    tx.commit().await?;

    results
        .send(PollResult::text(item_id, value))
        .await
        .map_err(|_| PollError::protocol("clock result channel closed"))
}
