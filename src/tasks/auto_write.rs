// olt_autowrite: save the running config on ZTE OLTs that have unsynced provisioning rows.

use super::{TaskContext, TaskName};
use crate::error::Result;
use crate::fleet::run_fleet;
use crate::models::{CredentialNeed, Host, Vendor};
use crate::vendor::{Driver, OltDriver};
use tracing::{debug, info};

pub async fn run(ctx: &TaskContext) -> anyhow::Result<()> {
    let hosts: Vec<Host> = ctx
        .repo
        .list_pollable_hosts(CredentialNeed::Terminal)
        .await?
        .into_iter()
        .filter(|h| h.vendor == Vendor::Zte)
        .collect();
    run_fleet(
        "olt_autowrite",
        hosts,
        ctx.deadlines.for_task(TaskName::OltAutowrite),
        |host| {
            let ctx = ctx.clone();
            async move { write_if_pending(&ctx, &host).await }
        },
    )
    .await;
    Ok(())
}

async fn write_if_pending(ctx: &TaskContext, host: &Host) -> Result<()> {
    let pending = ctx.repo.count_unsynced(host.ip).await?;
    if pending == 0 {
        debug!(host = %host.name, ip = %host.ip, "nothing pending");
        return Ok(());
    }

    let driver = Driver::for_host(host);
    let script = driver.login_script(&host.telnet_username, &host.telnet_password);
    let mut session = ctx.transport.open_terminal(host, &script).await?;
    // `write` on a loaded C300 can take most of a minute; it gets what login left over.
    let written = session
        .send("write", "#", ctx.deadlines.write_budget())
        .await;
    session.close().await;
    written?;

    let synced = ctx.repo.mark_synced(host.ip).await?;
    info!(host = %host.name, ip = %host.ip, pending, synced, "running config saved");
    Ok(())
}
