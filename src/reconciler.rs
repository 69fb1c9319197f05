// Keeps the item catalog in step with what a device reports.
// The snapshot is loaded once per worker and updated in place, so repeated passes over the
// same discovery are write-free.

use crate::error::{PollError, Result};
use crate::inventory_repo::InventoryRepo;
use crate::models::{HostId, InventoryItem, ItemId};
use sqlx::SqliteConnection;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Separator between the subscriber label and the legacy id in an ONU name.
const CORRELATION_SEPARATOR: &str = "_-_";

/// Legacy id parsed out of a vendor name such as `juan_perez_-_10452`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn from_onu_name(name: &str) -> Result<Self> {
        let parts: Vec<&str> = name.trim().split(CORRELATION_SEPARATOR).collect();
        if parts.len() < 2 {
            return Err(PollError::parse(format!("onu name '{name}' has no correlation id")));
        }
        let tail = parts[parts.len() - 1].trim();
        let id: i64 = tail
            .parse()
            .map_err(|_| PollError::parse(format!("onu name '{name}': '{tail}' is not numeric")))?;
        let id = id.to_string();
        if id.len() <= 2 {
            return Err(PollError::parse(format!("onu name '{name}': correlation id too short")));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Outcome of one reconcile step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Create,
    UpdateCorrelation,
    Reactivate,
    NoOp,
}

/// Pure decision table, evaluated in order.
pub fn decide(existing: Option<&InventoryItem>, correlation: Option<&str>) -> Decision {
    match existing {
        None => Decision::Create,
        Some(item) if correlation.is_some() && item.oldid.as_deref() != correlation => {
            Decision::UpdateCorrelation
        }
        Some(item) if !item.active => Decision::Reactivate,
        Some(_) => Decision::NoOp,
    }
}

pub struct Reconciler {
    host_id: HostId,
    snapshot: HashMap<(String, String), InventoryItem>,
    writes: usize,
}

impl Reconciler {
    pub fn new(host_id: HostId, items: Vec<InventoryItem>) -> Self {
        let snapshot = items
            .into_iter()
            .map(|item| ((item.index.clone(), item.name.clone()), item))
            .collect();
        Self {
            host_id,
            snapshot,
            writes: 0,
        }
    }

    /// Snapshot of every item the host owns.
    pub async fn load(repo: &InventoryRepo, host_id: HostId) -> Result<Self> {
        Ok(Self::new(host_id, repo.load_items(host_id, None).await?))
    }

    fn lookup(&self, index: &str, name: &str) -> Option<&InventoryItem> {
        self.snapshot.get(&(index.to_string(), name.to_string()))
    }

    pub fn item_id(&self, index: &str, name: &str) -> Option<ItemId> {
        self.lookup(index, name).map(|i| i.id)
    }

    /// Rows written through this reconciler so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Device-level item without correlation: created once, reactivated when needed.
    pub async fn ensure(
        &mut self,
        conn: &mut SqliteConnection,
        index: &str,
        name: &str,
    ) -> Result<ItemId> {
        self.apply(conn, index, name, None).await
    }

    /// Discovered ONU sub-component. A malformed name is skipped and yields `None`.
    pub async fn reconcile(
        &mut self,
        conn: &mut SqliteConnection,
        index: &str,
        onu_name: &str,
        kind: &str,
    ) -> Result<Option<ItemId>> {
        let correlation = match CorrelationId::from_onu_name(onu_name) {
            Ok(c) => c,
            Err(e) => {
                warn!(host_id = self.host_id, index, kind, error = %e, "skipping onu with malformed name");
                return Ok(None);
            }
        };
        self.apply(conn, index, kind, Some(correlation.as_str()))
            .await
            .map(Some)
    }

    async fn apply(
        &mut self,
        conn: &mut SqliteConnection,
        index: &str,
        name: &str,
        correlation: Option<&str>,
    ) -> Result<ItemId> {
        let key = (index.to_string(), name.to_string());
        let decision = decide(self.snapshot.get(&key), correlation);
        match decision {
            Decision::Create => {
                let id =
                    InventoryRepo::insert_item(conn, self.host_id, index, name, correlation).await?;
                debug!(host_id = self.host_id, index, name, id, "item created");
                self.writes += 1;
                self.snapshot.insert(
                    key,
                    InventoryItem {
                        id,
                        host_id: self.host_id,
                        index: index.to_string(),
                        name: name.to_string(),
                        oldid: correlation.map(str::to_string),
                        serial: None,
                        active: true,
                    },
                );
                Ok(id)
            }
            Decision::UpdateCorrelation | Decision::Reactivate => {
                let Some(item) = self.snapshot.get_mut(&key) else {
                    return Err(PollError::protocol(format!("item {index}/{name} vanished from snapshot")));
                };
                match (decision, correlation) {
                    (Decision::UpdateCorrelation, Some(oldid)) => {
                        InventoryRepo::update_item_correlation(conn, item.id, oldid).await?;
                        debug!(host_id = self.host_id, index, name, id = item.id, oldid, "correlation updated");
                        item.oldid = Some(oldid.to_string());
                    }
                    _ => {
                        InventoryRepo::reactivate_item(conn, item.id).await?;
                        debug!(host_id = self.host_id, index, name, id = item.id, "item reactivated");
                    }
                }
                item.active = true;
                self.writes += 1;
                Ok(item.id)
            }
            Decision::NoOp => self
                .snapshot
                .get(&key)
                .map(|i| i.id)
                .ok_or_else(|| PollError::protocol(format!("item {index}/{name} vanished from snapshot"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(oldid: Option<&str>, active: bool) -> InventoryItem {
        InventoryItem {
            id: 7,
            host_id: 1,
            index: "268501248.1".into(),
            name: "onu-sn".into(),
            oldid: oldid.map(str::to_string),
            serial: None,
            active,
        }
    }

    #[test]
    fn correlation_from_names() {
        assert_eq!(CorrelationId::from_onu_name("maria_-_10452").unwrap().as_str(), "10452");
        assert_eq!(CorrelationId::from_onu_name("a_-_b_-_00321").unwrap().as_str(), "321");
        assert!(CorrelationId::from_onu_name("maria-10452").is_err());
        assert!(CorrelationId::from_onu_name("maria_-_abc").is_err());
        assert!(CorrelationId::from_onu_name("maria_-_12").is_err());
    }

    #[test]
    fn decision_table_order() {
        assert_eq!(decide(None, Some("100")), Decision::Create);
        assert_eq!(decide(Some(&item(Some("100"), true)), Some("200")), Decision::UpdateCorrelation);
        assert_eq!(decide(Some(&item(Some("100"), false)), Some("200")), Decision::UpdateCorrelation);
        assert_eq!(decide(Some(&item(Some("100"), false)), Some("100")), Decision::Reactivate);
        assert_eq!(decide(Some(&item(Some("100"), true)), Some("100")), Decision::NoOp);
        assert_eq!(decide(Some(&item(None, true)), None), Decision::NoOp);
    }
}
