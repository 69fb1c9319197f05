// get_onu_info: ONU discovery and telemetry on ZTE OLTs.
//
// The name table drives discovery. Items are reconciled and committed first; the status,
// optical power and serial columns are then walked concurrently, each on its own session
// and in its own transaction.

use super::{TaskContext, TaskName};
use crate::cadence::{SubtaskClass, should_run};
use crate::error::Result;
use crate::fleet::run_fleet;
use crate::models::{CredentialNeed, Host, MeasureValue, PollResult, Vendor, names};
use crate::persist::persist;
use crate::reconciler::Reconciler;
use crate::transport::snmp::{Oid, SnmpValue, walk_table};
use crate::vendor::zte;
use chrono::{Timelike, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const DISCOVERY_MAX_OIDS: usize = 10;
const DISCOVERY_MAX_REPETITIONS: u32 = 10;
const COLUMN_MAX_OIDS: usize = 20;
const COLUMN_MAX_REPETITIONS: u32 = 20;

pub async fn run(ctx: &TaskContext) -> anyhow::Result<()> {
    let hosts = zte_only(ctx.repo.list_pollable_hosts(CredentialNeed::Snmp).await?, "get_onu_info");
    let deadline = ctx.deadlines.for_task(TaskName::GetOnuInfo);
    let walk_budget = ctx.deadlines.walk_budget(TaskName::GetOnuInfo);
    run_fleet("get_onu_info", hosts, deadline, |host| {
        let ctx = ctx.clone();
        async move { poll_onus(&ctx, &host, Instant::now() + walk_budget).await }
    })
    .await;
    Ok(())
}

/// Drops non-ZTE hosts; their ONU tables are not polled.
pub(super) fn zte_only(hosts: Vec<Host>, task: &str) -> Vec<Host> {
    hosts
        .into_iter()
        .filter(|h| {
            if h.vendor != Vendor::Zte {
                info!(task, host = %h.name, vendor = %h.vendor, "onu polling not supported for vendor");
            }
            h.vendor == Vendor::Zte
        })
        .collect()
}

async fn poll_onus(ctx: &TaskContext, host: &Host, deadline: Instant) -> Result<()> {
    let mut snmp = ctx
        .transport
        .open_snmp(host, DISCOVERY_MAX_OIDS, DISCOVERY_MAX_REPETITIONS, true)
        .await?;
    let walk = walk_table(&mut snmp, &zte::ONU_NAME.parse()?, DISCOVERY_MAX_REPETITIONS, deadline).await?;
    drop(snmp);
    if !walk.complete {
        warn!(host = %host.name, rows = walk.rows.len(), "onu name walk incomplete");
    }
    let discovered: Vec<(String, String)> = walk
        .rows
        .into_iter()
        .map(|(index, value)| (index, value.as_text().trim().to_string()))
        .collect();

    let mut reconciler = Reconciler::new(host.id, ctx.repo.load_items(host.id, Some("onu-")).await?);
    let before = reconciler.writes();
    let mut tx = ctx.repo.pool().begin().await?;
    for (index, name) in &discovered {
        for kind in names::ONU_KINDS {
            reconciler.reconcile(&mut *tx, index, name, kind).await?;
        }
    }
    tx.commit().await?;
    debug!(
        host = %host.name,
        onus = discovered.len(),
        writes = reconciler.writes() - before,
        "onu inventory reconciled"
    );

    let minute = Utc::now().with_timezone(&ctx.offset).minute();

    if should_run(SubtaskClass::Name, minute) {
        let results: Vec<PollResult> = discovered
            .iter()
            .filter_map(|(index, name)| {
                reconciler
                    .item_id(index, names::ONU_NAME)
                    .map(|id| PollResult::text(id, name.clone()))
            })
            .collect();
        if let Err(e) = persist(ctx.repo.pool(), &host.name, &results).await {
            warn!(host = %host.name, class = "name", error = %e, "onu names not stored");
        }
    }

    let columns = [
        Column {
            class: SubtaskClass::Status,
            table: zte::ONU_STATUS,
            kind: names::ONU_STATUS,
            convert: status_value,
        },
        Column {
            class: SubtaskClass::OpticalPower,
            table: zte::ONU_RX_POWER,
            kind: names::ONU_RX,
            convert: rx_power_value,
        },
        Column {
            class: SubtaskClass::Serial,
            table: zte::ONU_SERIAL,
            kind: names::ONU_SN,
            convert: serial_value,
        },
    ];
    let [status, rx, serial] = columns.map(|c| measure_column(ctx, host, &reconciler, c, minute, deadline));
    let (status, rx, serial) = tokio::join!(status, rx, serial);

    let mut first_error = None;
    for (class, outcome) in [("status", status), ("rx", rx), ("sn", serial)] {
        match outcome {
            Ok(rows) => debug!(host = %host.name, class, rows, "onu column stored"),
            Err(e) => {
                warn!(host = %host.name, class, kind = e.kind(), error = %e, "onu column failed");
                first_error.get_or_insert(e);
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}

struct Column {
    class: SubtaskClass,
    table: &'static str,
    kind: &'static str,
    convert: fn(&SnmpValue) -> Option<MeasureValue>,
}

async fn measure_column(
    ctx: &TaskContext,
    host: &Host,
    reconciler: &Reconciler,
    column: Column,
    minute: u32,
    deadline: Instant,
) -> Result<usize> {
    if !should_run(column.class, minute) {
        return Ok(0);
    }
    let base: Oid = column.table.parse()?;
    let mut snmp = ctx
        .transport
        .open_snmp(host, COLUMN_MAX_OIDS, COLUMN_MAX_REPETITIONS, false)
        .await?;
    let walk = walk_table(&mut snmp, &base, COLUMN_MAX_REPETITIONS, deadline).await?;
    let results: Vec<PollResult> = walk
        .rows
        .iter()
        .filter_map(|(index, value)| {
            let item_id = reconciler.item_id(index, column.kind)?;
            let value = (column.convert)(value)?;
            Some(PollResult { item_id, value })
        })
        .collect();
    persist(ctx.repo.pool(), &host.name, &results).await
}

fn status_value(value: &SnmpValue) -> Option<MeasureValue> {
    value.as_i64().map(|v| MeasureValue::Numeric(v as f64))
}

/// Raw power is in thousandths of a dBm; zero means no reading.
pub fn rx_power_value(value: &SnmpValue) -> Option<MeasureValue> {
    let raw = value.as_i64()?;
    if raw == 0 {
        return Some(MeasureValue::Numeric(0.0));
    }
    Some(MeasureValue::Numeric((raw as f64 / 1000.0 * 100.0).round() / 100.0))
}

fn serial_value(value: &SnmpValue) -> Option<MeasureValue> {
    let text = value.as_text().trim().to_string();
    (!text.is_empty()).then_some(MeasureValue::Text(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rx_power_scaling() {
        assert_eq!(rx_power_value(&SnmpValue::Integer(0)), Some(MeasureValue::Numeric(0.0)));
        assert_eq!(
            rx_power_value(&SnmpValue::Integer(-21456)),
            Some(MeasureValue::Numeric(-21.46))
        );
        assert_eq!(rx_power_value(&SnmpValue::Null), None);
    }

    #[test]
    fn empty_serial_is_dropped() {
        assert_eq!(serial_value(&SnmpValue::OctetString(b"  ".to_vec())), None);
        assert_eq!(
            serial_value(&SnmpValue::OctetString(b"ZTEGC1234567".to_vec())),
            Some(MeasureValue::Text("ZTEGC1234567".into()))
        );
    }
}
