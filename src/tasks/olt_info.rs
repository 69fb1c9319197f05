// get_olt_info: chassis readings per OLT, one transaction per device.

use super::{TaskContext, TaskName};
use crate::error::Result;
use crate::fleet::run_fleet;
use crate::models::{CredentialNeed, Host, Observation, PollResult};
use crate::persist::persist;
use crate::reconciler::Reconciler;
use crate::vendor::{Driver, OltDriver};
use sqlx::SqliteConnection;
use tracing::debug;

pub async fn run(ctx: &TaskContext) -> anyhow::Result<()> {
    let hosts = info_hosts(ctx.repo.list_pollable_hosts(CredentialNeed::Snmp).await?);
    run_fleet(
        "get_olt_info",
        hosts,
        ctx.deadlines.for_task(TaskName::GetOltInfo),
        |host| {
            let ctx = ctx.clone();
            async move { poll_info(&ctx, &host).await }
        },
    )
    .await;
    Ok(())
}

/// Keeps hosts carrying what their driver logs in with; ZTE chassis data is SNMP only.
pub fn info_hosts(hosts: Vec<Host>) -> Vec<Host> {
    hosts
        .into_iter()
        .filter(|h| h.has_credentials(Driver::for_host(h).info_credentials()))
        .collect()
}

async fn poll_info(ctx: &TaskContext, host: &Host) -> Result<()> {
    let driver = Driver::for_host(host);
    let observations = driver.collect_info(host, &ctx.transport).await?;
    debug!(host = %host.name, vendor = %host.vendor, readings = observations.len(), "chassis read");

    let mut reconciler = Reconciler::load(&ctx.repo, host.id).await?;
    let mut tx = ctx.repo.pool().begin().await?;
    let results = bind_items(&mut reconciler, &mut *tx, &observations).await?;
    tx.commit().await?;

    persist(ctx.repo.pool(), &host.name, &results).await?;
    Ok(())
}

/// Ensures an item for every observation and ties each value to its id.
pub async fn bind_items(
    reconciler: &mut Reconciler,
    conn: &mut SqliteConnection,
    observations: &[Observation],
) -> Result<Vec<PollResult>> {
    let mut results = Vec::with_capacity(observations.len());
    for obs in observations {
        let item_id = reconciler.ensure(conn, &obs.index, &obs.name).await?;
        results.push(PollResult {
            item_id,
            value: obs.value.clone(),
        });
    }
    Ok(results)
}
