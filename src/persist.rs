// Result aggregator. Workers push PollResults; one transaction per batch makes the batch
// visible all at once or not at all.

use crate::error::Result;
use crate::inventory_repo::{InventoryRepo, now_ms};
use crate::models::PollResult;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Buffer between producers and the writer task.
pub const RESULT_CHANNEL_CAPACITY: usize = 256;

/// Writes every result in one transaction. Any failed insert rolls back the whole batch.
pub async fn persist(pool: &SqlitePool, label: &str, results: &[PollResult]) -> Result<usize> {
    if results.is_empty() {
        return Ok(0);
    }
    let created_at = now_ms();
    let mut tx = pool.begin().await?;
    for result in results {
        if let Err(e) = InventoryRepo::insert_measurement(&mut *tx, result, created_at).await {
            warn!(host = label, item_id = result.item_id, error = %e, "insert failed, rolling back batch");
            tx.rollback().await?;
            return Err(e);
        }
    }
    tx.commit().await?;
    debug!(host = label, rows = results.len(), operation = "persist", "batch committed");
    Ok(results.len())
}

/// Spawns the collecting side of a result channel. The returned handle resolves once every
/// sender has been dropped and the buffered batch has been persisted.
pub fn spawn_result_writer(
    pool: SqlitePool,
    label: String,
) -> (mpsc::Sender<PollResult>, JoinHandle<Result<usize>>) {
    let (tx, mut rx) = mpsc::channel::<PollResult>(RESULT_CHANNEL_CAPACITY);
    let handle = tokio::spawn(async move {
        let mut buffer = Vec::new();
        while let Some(result) = rx.recv().await {
            buffer.push(result);
        }
        let written = persist(&pool, &label, &buffer).await;
        if let Err(e) = &written {
            warn!(host = %label, rows = buffer.len(), error = %e, "result writer: persist failed");
        }
        written
    });
    (tx, handle)
}
