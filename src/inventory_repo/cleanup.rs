// Hygiene queries behind the cleanup tasks.

use super::{InventoryRepo, now_ms};
use crate::error::Result;
use crate::models::{HostId, ItemId};
use sqlx::Row;
use tracing::instrument;

/// Liveness window for the owning host (icmp samples on its `avg` item).
pub const LIVENESS_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;
/// Corroboration window for the item itself.
pub const MEASUREMENT_WINDOW_MS: i64 = 12 * 60 * 60 * 1000;

/// Items of one host sharing a legacy id and kind.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub host_id: HostId,
    pub oldid: String,
    pub name: String,
}

/// One member of a duplicate group, with the evidence cleanup decides on.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateCandidate {
    pub item_id: ItemId,
    pub host_live: bool,
    pub recently_measured: bool,
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("${i}")).collect::<Vec<_>>().join(", ")
}

impl InventoryRepo {
    /// Copies authoritative OLT names from `documentation` onto `host`.
    #[instrument(skip(self), fields(repo = "inventory", operation = "sync_names_from_documentation"))]
    pub async fn sync_names_from_documentation(&self) -> Result<u64> {
        let done = sqlx::query(
            "UPDATE host SET name = (
                 SELECT d.name FROM documentation d
                 WHERE d.ip = host.ip AND d.present = 1 AND d.name LIKE '%olt%'
                 LIMIT 1
             )
             WHERE EXISTS (
                 SELECT 1 FROM documentation d
                 WHERE d.ip = host.ip AND d.present = 1 AND d.name LIKE '%olt%' AND d.name <> host.name
             )",
        )
        .execute(self.pool())
        .await?;
        Ok(done.rows_affected())
    }

    #[instrument(skip(self), fields(repo = "inventory", operation = "delete_items_named"))]
    pub async fn delete_items_named(&self, name: &str) -> Result<u64> {
        let done = sqlx::query("DELETE FROM host_item WHERE name = $1")
            .bind(name)
            .execute(self.pool())
            .await?;
        Ok(done.rows_affected())
    }

    /// (host, oldid, name) keys held by more than one item of the given kinds.
    #[instrument(skip(self), fields(repo = "inventory", operation = "duplicate_groups"))]
    pub async fn duplicate_groups(&self, kinds: &[&str]) -> Result<Vec<DuplicateGroup>> {
        if kinds.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT host_id, oldid, name FROM host_item
             WHERE oldid IS NOT NULL AND name IN ({})
             GROUP BY host_id, oldid, name HAVING COUNT(*) > 1
             ORDER BY host_id, oldid, name",
            placeholders(kinds.len())
        );
        let mut query = sqlx::query(&sql);
        for kind in kinds {
            query = query.bind(*kind);
        }
        let rows = query.fetch_all(self.pool()).await?;
        rows.iter()
            .map(|r| {
                Ok(DuplicateGroup {
                    host_id: r.try_get("host_id")?,
                    oldid: r.try_get("oldid")?,
                    name: r.try_get("name")?,
                })
            })
            .collect()
    }

    /// Members of one duplicate group in id order.
    pub async fn duplicate_candidates(&self, group: &DuplicateGroup) -> Result<Vec<DuplicateCandidate>> {
        let now = now_ms();
        let rows = sqlx::query(
            "SELECT hi.id,
                 EXISTS (
                     SELECT 1 FROM icmp i JOIN host_item a ON a.id = i.item_id
                     WHERE a.host_id = hi.host_id AND a.name = 'avg'
                       AND i.value > 0 AND i.created_at >= $3
                 ) AS host_live,
                 (EXISTS (SELECT 1 FROM measurement_int m WHERE m.item_id = hi.id AND m.created_at >= $4)
                  OR EXISTS (SELECT 1 FROM measurement_text t WHERE t.item_id = hi.id AND t.created_at >= $4)
                 ) AS recently_measured
             FROM host_item hi
             WHERE hi.oldid = $1 AND hi.name = $2 AND hi.host_id = $5
             ORDER BY hi.id ASC",
        )
        .bind(&group.oldid)
        .bind(&group.name)
        .bind(now - LIVENESS_WINDOW_MS)
        .bind(now - MEASUREMENT_WINDOW_MS)
        .bind(group.host_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter()
            .map(|r| {
                Ok(DuplicateCandidate {
                    item_id: r.try_get("id")?,
                    host_live: r.try_get("host_live")?,
                    recently_measured: r.try_get("recently_measured")?,
                })
            })
            .collect()
    }

    pub async fn delete_item(&self, id: ItemId) -> Result<u64> {
        let done = sqlx::query("DELETE FROM host_item WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(done.rows_affected())
    }

    /// Serials that appear on at most two of the host's rows carrying `oldid`.
    pub async fn sparse_serials(&self, host_id: HostId, oldid: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT sn FROM host_item WHERE host_id = $1 AND oldid = $2
             GROUP BY sn HAVING COUNT(*) <= 2 ORDER BY sn",
        )
        .bind(host_id)
        .bind(oldid)
        .fetch_all(self.pool())
        .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("sn").map_err(Into::into))
            .collect()
    }

    pub async fn delete_by_serial(&self, group: &DuplicateGroup, sn: &str) -> Result<u64> {
        let done = sqlx::query(
            "DELETE FROM host_item WHERE sn = $1 AND oldid = $2 AND name = $3 AND host_id = $4",
        )
        .bind(sn)
        .bind(&group.oldid)
        .bind(&group.name)
        .bind(group.host_id)
            .execute(self.pool())
            .await?;
        Ok(done.rows_affected())
    }

    /// Records an external liveness sample. The pinger owns this table in production.
    pub async fn insert_icmp(&self, item_id: ItemId, value: f64, created_at: i64) -> Result<()> {
        sqlx::query("INSERT INTO icmp (item_id, value, created_at) VALUES ($1, $2, $3)")
            .bind(item_id)
            .bind(value)
            .bind(created_at)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
