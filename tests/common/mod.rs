// Shared test helpers
#![allow(dead_code)]

use oltpoller::config::{DeadlineConfig, PollingConfig};
use oltpoller::inventory_repo::InventoryRepo;
use oltpoller::models::{HostId, HostInfoBlob, InventoryItem, ItemId, TrafficSample};
use oltpoller::tasks::TaskContext;
use std::net::IpAddr;
use std::sync::Arc;
use tempfile::TempDir;

/// Fresh database in a temp dir; keep the TempDir alive for the test's duration.
pub async fn temp_repo() -> (TempDir, InventoryRepo) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("inventory.db");
    let repo = InventoryRepo::connect(path.to_str().unwrap(), 4).await.unwrap();
    repo.init().await.unwrap();
    (dir, repo)
}

pub fn info(user: &str, pass: &str, community: &str) -> HostInfoBlob {
    let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
    HostInfoBlob {
        telnet_username: opt(user),
        telnet_password: opt(pass),
        snmp_read_community: opt(community),
    }
}

pub async fn add_host(repo: &InventoryRepo, ip: &str, name: &str, info: HostInfoBlob) -> HostId {
    let ip: IpAddr = ip.parse().unwrap();
    repo.insert_host(ip, name, &info, true).await.unwrap()
}

/// Task context pointed at local fakes: no ICMP check, custom telnet port.
pub fn local_ctx(repo: Arc<InventoryRepo>, telnet_port: u16) -> TaskContext {
    let polling = PollingConfig {
        telnet_port,
        snmp_port: 1,
        verify_reachable: false,
        ..PollingConfig::default()
    };
    TaskContext::new(repo, &polling).unwrap()
}

/// Task context aimed at a local SNMP agent with the given worker deadlines.
pub fn snmp_ctx(repo: Arc<InventoryRepo>, snmp_port: u16, deadlines: DeadlineConfig) -> TaskContext {
    let polling = PollingConfig {
        snmp_port,
        verify_reachable: false,
        deadlines,
        ..PollingConfig::default()
    };
    TaskContext::new(repo, &polling).unwrap()
}

pub async fn count(repo: &InventoryRepo, sql: &str) -> i64 {
    let row: (i64,) = sqlx::query_as(sql).fetch_one(repo.pool()).await.unwrap();
    row.0
}

pub async fn item_by_id(repo: &InventoryRepo, id: ItemId) -> Option<InventoryItem> {
    let row: Option<(ItemId, HostId, String, String, Option<String>, Option<String>, bool)> = sqlx::query_as(
        "SELECT id, host_id, sn, name, oldid, serial, active FROM host_item WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(repo.pool())
    .await
    .unwrap();
    row.map(|(id, host_id, index, name, oldid, serial, active)| InventoryItem {
        id,
        host_id,
        index,
        name,
        oldid,
        serial,
        active,
    })
}

/// Numeric values for one item, oldest first.
pub async fn numeric_values(repo: &InventoryRepo, item_id: ItemId) -> Vec<f64> {
    sqlx::query_scalar("SELECT value FROM measurement_int WHERE item_id = $1 ORDER BY id ASC")
        .bind(item_id)
        .fetch_all(repo.pool())
        .await
        .unwrap()
}

/// Text values for one item, oldest first.
pub async fn text_values(repo: &InventoryRepo, item_id: ItemId) -> Vec<String> {
    sqlx::query_scalar("SELECT value FROM measurement_text WHERE item_id = $1 ORDER BY id ASC")
        .bind(item_id)
        .fetch_all(repo.pool())
        .await
        .unwrap()
}

pub async fn traffic_samples(repo: &InventoryRepo) -> Vec<TrafficSample> {
    let rows: Vec<(String, i64, i64, i64, i64)> =
        sqlx::query_as("SELECT sn, kbup, kbdw, pkup, pkdw FROM traffic_onu ORDER BY id ASC")
            .fetch_all(repo.pool())
            .await
            .unwrap();
    rows.into_iter()
        .map(|(serial, upload_kbps, download_kbps, upload_pps, download_pps)| TrafficSample {
            serial,
            upload_kbps,
            download_kbps,
            upload_pps,
            download_pps,
        })
        .collect()
}
