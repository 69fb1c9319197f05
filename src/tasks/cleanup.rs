// clean_olt_data / clean_onu_data: inventory hygiene.
//
// Duplicate ONU items (same host, legacy id and kind) are pruned at most one per group per run.
// A duplicate is only removed while its host shows icmp liveness in the last 24h and the
// item itself has stored nothing in the last 12h.

use super::{TaskContext, TaskName};
use crate::inventory_repo::InventoryRepo;
use crate::models::names;
use tracing::{debug, info};

/// Legacy kind retired from the catalog.
pub const RETIRED_KIND: &str = "onu-tx2";

/// Kinds pruned by measurement absence.
pub const MEASURED_KINDS: [&str; 4] = [names::ONU_SN, names::ONU_NAME, names::ONU_RX, names::ONU_STATUS];
/// Kinds pruned by serial sparsity.
pub const SERIAL_KINDS: [&str; 2] = [names::ONU_ETHLIST, names::ONU_TX];

pub async fn run_olt(ctx: &TaskContext) -> anyhow::Result<()> {
    let renamed = tokio::time::timeout(
        ctx.deadlines.for_task(TaskName::CleanOltData),
        ctx.repo.sync_names_from_documentation(),
    )
    .await
    .map_err(|_| anyhow::anyhow!("olt name sync timed out"))??;
    info!(task = "clean_olt_data", renamed, "olt names synced");
    Ok(())
}

pub async fn run_onu(ctx: &TaskContext) -> anyhow::Result<()> {
    let report = tokio::time::timeout(
        ctx.deadlines.for_task(TaskName::CleanOnuData),
        clean_onu_items(&ctx.repo),
    )
    .await
    .map_err(|_| anyhow::anyhow!("onu cleanup timed out"))??;
    info!(
        task = "clean_onu_data",
        retired = report.retired,
        stale = report.stale,
        sparse = report.sparse,
        "onu items cleaned"
    );
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub retired: u64,
    pub stale: u64,
    pub sparse: u64,
}

pub async fn clean_onu_items(repo: &InventoryRepo) -> crate::error::Result<CleanupReport> {
    let mut report = CleanupReport {
        retired: repo.delete_items_named(RETIRED_KIND).await?,
        ..CleanupReport::default()
    };

    for group in repo.duplicate_groups(&MEASURED_KINDS).await? {
        for candidate in repo.duplicate_candidates(&group).await? {
            if !candidate.host_live {
                debug!(oldid = %group.oldid, name = %group.name, host_id = group.host_id, "host not confirmed live, keeping item");
                continue;
            }
            if candidate.recently_measured {
                continue;
            }
            report.stale += repo.delete_item(candidate.item_id).await?;
            debug!(oldid = %group.oldid, name = %group.name, item_id = candidate.item_id, "stale duplicate removed");
            break;
        }
    }

    for group in repo.duplicate_groups(&SERIAL_KINDS).await? {
        if let Some(sn) = repo.sparse_serials(group.host_id, &group.oldid).await?.into_iter().next() {
            report.sparse += repo.delete_by_serial(&group, &sn).await?;
            debug!(oldid = %group.oldid, name = %group.name, sn = %sn, "sparse duplicate removed");
        }
    }
    Ok(report)
}
