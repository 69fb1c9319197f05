// Reconciler tests: idempotence, malformed names, correlation updates, reactivation

mod common;

use common::{add_host, count, info, item_by_id, temp_repo};
use oltpoller::models::names;
use oltpoller::reconciler::Reconciler;

#[tokio::test]
async fn reconcile_twice_writes_once() {
    let (_dir, repo) = temp_repo().await;
    let host = add_host(&repo, "10.0.0.1", "olt", info("zte", "pw", "c")).await;

    let mut rec = Reconciler::load(&repo, host).await.unwrap();
    let mut tx = repo.pool().begin().await.unwrap();
    let first = rec
        .reconcile(&mut tx, "268501248.1", "ana_-_10452", names::ONU_SN)
        .await
        .unwrap();
    let second = rec
        .reconcile(&mut tx, "268501248.1", "ana_-_10452", names::ONU_SN)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert!(first.is_some());
    assert_eq!(first, second);
    assert_eq!(rec.writes(), 1);
    assert_eq!(count(&repo, "SELECT COUNT(*) FROM host_item").await, 1);

    // A fresh snapshot sees the committed row and stays write-free.
    let mut rec = Reconciler::load(&repo, host).await.unwrap();
    let mut tx = repo.pool().begin().await.unwrap();
    let third = rec
        .reconcile(&mut tx, "268501248.1", "ana_-_10452", names::ONU_SN)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(third, first);
    assert_eq!(rec.writes(), 0);
    assert_eq!(count(&repo, "SELECT COUNT(*) FROM host_item").await, 1);
}

#[tokio::test]
async fn malformed_name_never_creates_or_updates() {
    let (_dir, repo) = temp_repo().await;
    let host = add_host(&repo, "10.0.0.1", "olt", info("zte", "pw", "c")).await;

    let mut rec = Reconciler::load(&repo, host).await.unwrap();
    let mut tx = repo.pool().begin().await.unwrap();
    let created = rec
        .reconcile(&mut tx, "268501248.1", "ana_-_10452", names::ONU_RX)
        .await
        .unwrap();
    for bad in ["ana-10452", "ana_-_", "ana_-_x99", "ana_-_7"] {
        assert_eq!(
            rec.reconcile(&mut tx, "268501248.1", bad, names::ONU_RX).await.unwrap(),
            None
        );
        assert_eq!(
            rec.reconcile(&mut tx, "268501248.2", bad, names::ONU_RX).await.unwrap(),
            None
        );
    }
    tx.commit().await.unwrap();

    assert_eq!(rec.writes(), 1);
    let items = repo.load_items(host, None).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(Some(items[0].id), created);
    assert_eq!(items[0].oldid.as_deref(), Some("10452"));
}

#[tokio::test]
async fn renumbered_onu_updates_correlation_in_place() {
    let (_dir, repo) = temp_repo().await;
    let host = add_host(&repo, "10.0.0.1", "olt", info("zte", "pw", "c")).await;

    let mut rec = Reconciler::load(&repo, host).await.unwrap();
    let mut tx = repo.pool().begin().await.unwrap();
    let id = rec
        .reconcile(&mut tx, "268501248.3", "luis_-_20001", names::ONU_STATUS)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut rec = Reconciler::load(&repo, host).await.unwrap();
    let mut tx = repo.pool().begin().await.unwrap();
    let again = rec
        .reconcile(&mut tx, "268501248.3", "carla_-_20777", names::ONU_STATUS)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(id, again);
    let item = item_by_id(&repo, id.unwrap()).await.unwrap();
    assert_eq!(item.oldid.as_deref(), Some("20777"));
    assert!(item.active);
    assert_eq!(count(&repo, "SELECT COUNT(*) FROM host_item").await, 1);
}

#[tokio::test]
async fn inactive_item_is_reactivated() {
    let (_dir, repo) = temp_repo().await;
    let host = add_host(&repo, "10.0.0.1", "olt", info("zte", "pw", "c")).await;

    let mut rec = Reconciler::load(&repo, host).await.unwrap();
    let mut tx = repo.pool().begin().await.unwrap();
    let id = rec.ensure(&mut tx, ".1.3.6.1.2.1.1.3.0", names::UPTIME).await.unwrap();
    tx.commit().await.unwrap();

    sqlx::query("UPDATE host_item SET active = 0 WHERE id = $1")
        .bind(id)
        .execute(repo.pool())
        .await
        .unwrap();

    let mut rec = Reconciler::load(&repo, host).await.unwrap();
    let mut tx = repo.pool().begin().await.unwrap();
    assert_eq!(rec.ensure(&mut tx, ".1.3.6.1.2.1.1.3.0", names::UPTIME).await.unwrap(), id);
    tx.commit().await.unwrap();
    assert_eq!(rec.writes(), 1);
    assert!(item_by_id(&repo, id).await.unwrap().active);
}

#[tokio::test]
async fn kinds_and_hosts_are_separate_keys() {
    let (_dir, repo) = temp_repo().await;
    let a = add_host(&repo, "10.0.0.1", "olt-a", info("zte", "pw", "c")).await;
    let b = add_host(&repo, "10.0.0.2", "olt-b", info("zte", "pw", "c")).await;

    for host in [a, b] {
        let mut rec = Reconciler::load(&repo, host).await.unwrap();
        let mut tx = repo.pool().begin().await.unwrap();
        for kind in names::ONU_KINDS {
            rec.reconcile(&mut tx, "268501248.1", "ana_-_10452", kind).await.unwrap();
        }
        tx.commit().await.unwrap();
        let sql = format!("SELECT COUNT(*) FROM host_item WHERE host_id = {host}");
        assert_eq!(count(&repo, &sql).await, 6);
    }
    assert_eq!(count(&repo, "SELECT COUNT(*) FROM host_item").await, 12);
}

#[tokio::test]
async fn uncommitted_discovery_leaves_no_rows() {
    let (_dir, repo) = temp_repo().await;
    let host = add_host(&repo, "10.0.0.1", "olt", info("zte", "pw", "c")).await;

    let mut rec = Reconciler::load(&repo, host).await.unwrap();
    let mut tx = repo.pool().begin().await.unwrap();
    rec.reconcile(&mut tx, "268501248.1", "ana_-_10452", names::ONU_SN)
        .await
        .unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(count(&repo, "SELECT COUNT(*) FROM host_item").await, 0);
}
