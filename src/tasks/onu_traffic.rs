// get_onu_traffic: per-ONU byte and packet rates on ZTE OLTs.
// Two paginated walks (octets, packets) run side by side and feed one channel; the channel
// closes once both walkers are done and the collected rows go out in one transaction.

use super::onu_info::zte_only;
use super::{TaskContext, TaskName};
use crate::error::Result;
use crate::fleet::run_fleet;
use crate::inventory_repo::{InventoryRepo, now_ms};
use crate::models::{CredentialNeed, Host, TrafficSample};
use crate::transport::snmp::{Oid, walk_table};
use crate::vendor::zte;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

const MAX_OIDS: usize = 20;
const MAX_REPETITIONS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rate {
    UploadOctets,
    DownloadOctets,
    UploadPackets,
    DownloadPackets,
}

/// One rate reading for the ONU at `index`.
#[derive(Debug, Clone, PartialEq)]
pub struct RateRow {
    pub index: String,
    pub rate: Rate,
    pub value: i64,
}

pub async fn run(ctx: &TaskContext) -> anyhow::Result<()> {
    let hosts = zte_only(ctx.repo.list_pollable_hosts(CredentialNeed::Snmp).await?, "get_onu_traffic");
    let deadline = ctx.deadlines.for_task(TaskName::GetOnuTraffic);
    let walk_budget = ctx.deadlines.walk_budget(TaskName::GetOnuTraffic);
    run_fleet("get_onu_traffic", hosts, deadline, |host| {
        let ctx = ctx.clone();
        async move { poll_traffic(&ctx, &host, Instant::now() + walk_budget).await }
    })
    .await;
    Ok(())
}

async fn poll_traffic(ctx: &TaskContext, host: &Host, deadline: Instant) -> Result<()> {
    let mut snmp = ctx.transport.open_snmp(host, MAX_OIDS, MAX_REPETITIONS, true).await?;
    let walk = walk_table(&mut snmp, &zte::ONU_SERIAL.parse()?, MAX_REPETITIONS, deadline).await?;
    drop(snmp);
    let serials: HashMap<String, String> = walk
        .rows
        .into_iter()
        .filter_map(|(index, value)| serial_from_column(&value.as_text()).map(|sn| (index, sn)))
        .collect();
    if serials.is_empty() {
        debug!(host = %host.name, "no onu serials reported");
        return Ok(());
    }

    let (tx, mut rx) = mpsc::channel::<RateRow>(crate::persist::RESULT_CHANNEL_CAPACITY);
    let octets = walk_rates(
        ctx,
        host,
        [
            (zte::ONU_RX_OCTET_RATE, Rate::UploadOctets),
            (zte::ONU_TX_OCTET_RATE, Rate::DownloadOctets),
        ],
        deadline,
        tx.clone(),
    );
    let packets = walk_rates(
        ctx,
        host,
        [
            (zte::ONU_RX_PKT_RATE, Rate::UploadPackets),
            (zte::ONU_TX_PKT_RATE, Rate::DownloadPackets),
        ],
        deadline,
        tx,
    );
    let collect = async {
        let mut rows = Vec::new();
        while let Some(row) = rx.recv().await {
            rows.push(row);
        }
        rows
    };
    let (octets, packets, rows) = tokio::join!(octets, packets, collect);
    for (class, outcome) in [("octets", &octets), ("packets", &packets)] {
        if let Err(e) = outcome {
            warn!(host = %host.name, class, kind = e.kind(), error = %e, "rate walk failed");
        }
    }

    let samples = fold_rates(&serials, rows);
    let created_at = now_ms();
    let mut db = ctx.repo.pool().begin().await?;
    for sample in &samples {
        InventoryRepo::insert_traffic(&mut *db, sample, created_at).await?;
    }
    db.commit().await?;
    debug!(host = %host.name, onus = samples.len(), "traffic stored");
    octets.and(packets)
}

/// Walks both tables in order on a dedicated session; the sender drops when this returns.
async fn walk_rates(
    ctx: &TaskContext,
    host: &Host,
    tables: [(&'static str, Rate); 2],
    deadline: Instant,
    out: mpsc::Sender<RateRow>,
) -> Result<()> {
    let mut snmp = ctx.transport.open_snmp(host, MAX_OIDS, MAX_REPETITIONS, false).await?;
    for (table, rate) in tables {
        let base: Oid = table.parse()?;
        let walk = walk_table(&mut snmp, &base, MAX_REPETITIONS, deadline).await?;
        for (index, value) in walk.rows {
            let Some(value) = value.as_i64() else { continue };
            if out.send(RateRow { index, rate, value }).await.is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// The serial column reads `<port>,<serial>`; only the serial is kept.
pub fn serial_from_column(raw: &str) -> Option<String> {
    let serial = raw.rsplit(',').next()?.trim();
    (!serial.is_empty()).then(|| serial.to_string())
}

/// Bytes per second to kilobits per second, ties to even.
pub fn octets_to_kbps(bytes_per_sec: i64) -> i64 {
    (bytes_per_sec as f64 / 125.0).round_ties_even() as i64
}

/// One sample per ONU with a known serial, in serial order. ONUs without rate rows stay at zero.
pub fn fold_rates(serials: &HashMap<String, String>, rows: Vec<RateRow>) -> Vec<TrafficSample> {
    let mut by_index: HashMap<&str, TrafficSample> = serials
        .iter()
        .map(|(index, serial)| {
            let sample = TrafficSample {
                serial: serial.clone(),
                ..TrafficSample::default()
            };
            (index.as_str(), sample)
        })
        .collect();
    for row in rows {
        let Some(sample) = by_index.get_mut(row.index.as_str()) else {
            continue;
        };
        match row.rate {
            Rate::UploadOctets => sample.upload_kbps = octets_to_kbps(row.value),
            Rate::DownloadOctets => sample.download_kbps = octets_to_kbps(row.value),
            Rate::UploadPackets => sample.upload_pps = row.value,
            Rate::DownloadPackets => sample.download_pps = row.value,
        }
    }
    let mut samples: Vec<TrafficSample> = by_index.into_values().collect();
    samples.sort_by(|a, b| a.serial.cmp(&b.serial));
    samples
}
