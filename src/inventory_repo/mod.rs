// SQLite inventory: hosts, their items, and the append-only measurement tables.
// Item and measurement writes take a connection so callers can batch them in one transaction.

pub mod cleanup;
mod schema;

use crate::error::Result;
use crate::models::{
    CredentialNeed, Host, HostId, HostInfoBlob, InventoryItem, ItemId, MeasureValue, PollResult,
    TrafficSample, pollable_hosts,
};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use tracing::{instrument, warn};

pub use cleanup::{DuplicateCandidate, DuplicateGroup};

/// Unix milliseconds, the timestamp unit of every table.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub struct InventoryRepo {
    pool: SqlitePool,
}

impl InventoryRepo {
    pub async fn connect(path: &str, max_pool_size: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_pool_size)
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        schema::create_all(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// (open connections, idle connections)
    pub fn pool_status(&self) -> (u32, usize) {
        (self.pool.size(), self.pool.num_idle())
    }

    #[instrument(skip(self, info), fields(repo = "inventory", operation = "insert_host"))]
    pub async fn insert_host(
        &self,
        ip: IpAddr,
        name: &str,
        info: &HostInfoBlob,
        active: bool,
    ) -> Result<HostId> {
        let blob = serde_json::to_string(info).unwrap_or_else(|_| "{}".into());
        let id = sqlx::query("INSERT INTO host (ip, name, info, active) VALUES ($1, $2, $3, $4)")
            .bind(ip.to_string())
            .bind(name)
            .bind(blob)
            .bind(active)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        Ok(id)
    }

    #[instrument(skip(self), fields(repo = "inventory", operation = "list_hosts"))]
    pub async fn list_hosts(&self) -> Result<Vec<Host>> {
        let rows = sqlx::query("SELECT id, ip, name, info, active FROM host ORDER BY ip ASC")
            .fetch_all(&self.pool)
            .await?;
        let mut hosts = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(host) = Self::parse_host_row(row)? {
                hosts.push(host);
            }
        }
        Ok(hosts)
    }

    /// Active hosts carrying the credentials `need` asks for.
    pub async fn list_pollable_hosts(&self, need: CredentialNeed) -> Result<Vec<Host>> {
        Ok(pollable_hosts(self.list_hosts().await?, need))
    }

    fn parse_host_row(row: &SqliteRow) -> Result<Option<Host>> {
        let id: i64 = row.try_get("id")?;
        let ip: String = row.try_get("ip")?;
        let name: String = row.try_get("name")?;
        let info: String = row.try_get("info")?;
        let active: bool = row.try_get("active")?;

        let Ok(ip) = ip.trim().parse::<IpAddr>() else {
            warn!(host_id = id, ip = %ip, "skipping host with unparseable address");
            return Ok(None);
        };
        let info = serde_json::from_str::<HostInfoBlob>(&info).unwrap_or_else(|e| {
            warn!(host_id = id, error = %e, "host info is not valid json, treating as empty");
            HostInfoBlob::default()
        });
        Ok(Some(Host::new(id, ip, name, info, active)))
    }

    /// Item snapshot for one host, optionally narrowed to names starting with `name_prefix`.
    #[instrument(skip(self), fields(repo = "inventory", operation = "load_items"))]
    pub async fn load_items(
        &self,
        host_id: HostId,
        name_prefix: Option<&str>,
    ) -> Result<Vec<InventoryItem>> {
        let pattern = format!("{}%", name_prefix.unwrap_or(""));
        let rows = sqlx::query(
            "SELECT id, host_id, sn, name, oldid, serial, active FROM host_item
             WHERE host_id = $1 AND name LIKE $2 ORDER BY id ASC",
        )
        .bind(host_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::parse_item_row).collect()
    }

    fn parse_item_row(row: &SqliteRow) -> Result<InventoryItem> {
        Ok(InventoryItem {
            id: row.try_get("id")?,
            host_id: row.try_get("host_id")?,
            index: row.try_get("sn")?,
            name: row.try_get("name")?,
            oldid: row.try_get("oldid")?,
            serial: row.try_get("serial")?,
            active: row.try_get("active")?,
        })
    }

    pub async fn insert_item(
        conn: &mut SqliteConnection,
        host_id: HostId,
        index: &str,
        name: &str,
        oldid: Option<&str>,
    ) -> Result<ItemId> {
        let id = sqlx::query(
            "INSERT INTO host_item (host_id, sn, name, oldid, active, created_at)
             VALUES ($1, $2, $3, $4, 1, $5)",
        )
        .bind(host_id)
        .bind(index)
        .bind(name)
        .bind(oldid)
        .bind(now_ms())
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn update_item_correlation(
        conn: &mut SqliteConnection,
        id: ItemId,
        oldid: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE host_item SET oldid = $1, active = 1 WHERE id = $2")
            .bind(oldid)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn reactivate_item(conn: &mut SqliteConnection, id: ItemId) -> Result<()> {
        sqlx::query("UPDATE host_item SET active = 1 WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn insert_measurement(
        conn: &mut SqliteConnection,
        result: &PollResult,
        created_at: i64,
    ) -> Result<()> {
        let query = match &result.value {
            MeasureValue::Numeric(v) => sqlx::query(
                "INSERT INTO measurement_int (item_id, value, created_at) VALUES ($1, $2, $3)",
            )
            .bind(result.item_id)
            .bind(*v),
            MeasureValue::Text(v) => sqlx::query(
                "INSERT INTO measurement_text (item_id, value, created_at) VALUES ($1, $2, $3)",
            )
            .bind(result.item_id)
            .bind(v.as_str()),
        };
        query.bind(created_at).execute(&mut *conn).await?;
        Ok(())
    }

    pub async fn insert_traffic(
        conn: &mut SqliteConnection,
        sample: &TrafficSample,
        created_at: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO traffic_onu (sn, kbup, kbdw, pkup, pkdw, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&sample.serial)
        .bind(sample.upload_kbps)
        .bind(sample.download_kbps)
        .bind(sample.upload_pps)
        .bind(sample.download_pps)
        .bind(created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = "inventory", operation = "count_unsynced"))]
    pub async fn count_unsynced(&self, ip: IpAddr) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM pending_onu WHERE host_ip = $1 AND synced = 0")
            .bind(ip.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    #[instrument(skip(self), fields(repo = "inventory", operation = "mark_synced"))]
    pub async fn mark_synced(&self, ip: IpAddr) -> Result<u64> {
        let done = sqlx::query("UPDATE pending_onu SET synced = 1 WHERE host_ip = $1 AND synced = 0")
            .bind(ip.to_string())
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }
}
