// InventoryRepo + persist tests: init, host filtering, atomic batches, pending writes

mod common;

use common::{add_host, count, info, numeric_values, temp_repo, text_values, traffic_samples};
use oltpoller::inventory_repo::{InventoryRepo, now_ms};
use oltpoller::models::{CredentialNeed, PollResult, TrafficSample, Vendor};
use oltpoller::persist::{persist, spawn_result_writer};

#[tokio::test]
async fn inventory_repo_connect_and_init() {
    let (_dir, repo) = temp_repo().await;
    // Second init is no-op (IF NOT EXISTS)
    repo.init().await.unwrap();
    assert_eq!(repo.list_hosts().await.unwrap().len(), 0);
}

#[tokio::test]
async fn inactive_or_incomplete_hosts_are_not_pollable() {
    let (_dir, repo) = temp_repo().await;
    add_host(&repo, "10.0.0.1", "olt-full", info("zte", "pw", "public")).await;
    add_host(&repo, "10.0.0.2", "olt-no-pass", info("zte", "", "public")).await;
    add_host(&repo, "10.0.0.3", "olt-no-community", info("vsol", "pw", "")).await;
    add_host(&repo, "10.0.0.4", "olt-no-user", info("", "pw", "public")).await;
    repo.insert_host(
        "10.0.0.5".parse().unwrap(),
        "olt-inactive",
        &info("zte", "pw", "public"),
        false,
    )
    .await
    .unwrap();

    let names = |need: CredentialNeed| {
        let repo = &repo;
        async move {
            repo.list_pollable_hosts(need)
                .await
                .unwrap()
                .into_iter()
                .map(|h| h.name)
                .collect::<Vec<_>>()
        }
    };
    assert_eq!(names(CredentialNeed::TerminalAndSnmp).await, vec!["olt-full"]);
    assert_eq!(names(CredentialNeed::Terminal).await, vec!["olt-full", "olt-no-community"]);
    assert_eq!(names(CredentialNeed::Snmp).await, vec!["olt-full", "olt-no-pass"]);
}

#[tokio::test]
async fn bad_host_rows_are_skipped_or_defaulted() {
    let (_dir, repo) = temp_repo().await;
    sqlx::query("INSERT INTO host (ip, name, info, active) VALUES ('not-an-ip', 'broken', '{}', 1)")
        .execute(repo.pool())
        .await
        .unwrap();
    sqlx::query("INSERT INTO host (ip, name, info, active) VALUES ('10.0.0.9', 'garbled', '{oops', 1)")
        .execute(repo.pool())
        .await
        .unwrap();
    let hosts = repo.list_hosts().await.unwrap();
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].name, "garbled");
    assert!(hosts[0].telnet_username.is_empty());
    assert!(repo.list_pollable_hosts(CredentialNeed::Terminal).await.unwrap().is_empty());
}

#[tokio::test]
async fn vendor_is_resolved_from_username() {
    let (_dir, repo) = temp_repo().await;
    add_host(&repo, "10.0.0.1", "a", info("VSOL", "pw", "c")).await;
    add_host(&repo, "10.0.0.2", "b", info("cdata", "pw", "c")).await;
    add_host(&repo, "10.0.0.3", "c", info("admin", "pw", "c")).await;
    let vendors: Vec<Vendor> = repo.list_hosts().await.unwrap().iter().map(|h| h.vendor).collect();
    assert_eq!(vendors, vec![Vendor::Vsol, Vendor::Cdata, Vendor::Zte]);
}

#[tokio::test]
async fn persist_writes_both_tables_in_one_batch() {
    let (_dir, repo) = temp_repo().await;
    let host = add_host(&repo, "10.0.0.1", "olt", info("zte", "pw", "c")).await;
    let mut conn = repo.pool().acquire().await.unwrap();
    let temp = InventoryRepo::insert_item(&mut conn, host, ".1.2.3", "temperature", None).await.unwrap();
    let model = InventoryRepo::insert_item(&mut conn, host, ".1.2.4", "devmodel", None).await.unwrap();
    drop(conn);

    let written = persist(
        repo.pool(),
        "olt",
        &[PollResult::numeric(temp, 41.0), PollResult::text(model, "zxa10 c320")],
    )
    .await
    .unwrap();
    assert_eq!(written, 2);
    assert_eq!(numeric_values(&repo, temp).await, vec![41.0]);
    assert_eq!(text_values(&repo, model).await, vec!["zxa10 c320".to_string()]);
}

#[tokio::test]
async fn failed_insert_rolls_back_the_whole_batch() {
    let (_dir, repo) = temp_repo().await;
    let host = add_host(&repo, "10.0.0.1", "olt", info("zte", "pw", "c")).await;
    let mut conn = repo.pool().acquire().await.unwrap();
    let item = InventoryRepo::insert_item(&mut conn, host, ".1", "uptime", None).await.unwrap();
    drop(conn);

    // Third of four results points at an item that does not exist.
    let batch = [
        PollResult::numeric(item, 1.0),
        PollResult::numeric(item, 2.0),
        PollResult::numeric(999_999, 3.0),
        PollResult::numeric(item, 4.0),
    ];
    assert!(persist(repo.pool(), "olt", &batch).await.is_err());
    let stored = count(
        &repo,
        "SELECT (SELECT COUNT(*) FROM measurement_int) + (SELECT COUNT(*) FROM measurement_text)",
    )
    .await;
    assert_eq!(stored, 0);
}

#[tokio::test]
async fn result_writer_commits_after_all_senders_drop() {
    let (_dir, repo) = temp_repo().await;
    let host = add_host(&repo, "10.0.0.1", "olt", info("zte", "pw", "c")).await;
    let mut conn = repo.pool().acquire().await.unwrap();
    let item = InventoryRepo::insert_item(&mut conn, host, "telnet-show-clock", "clock", None)
        .await
        .unwrap();
    drop(conn);

    let (tx, writer) = spawn_result_writer(repo.pool().clone(), "fleet".into());
    let mut producers = Vec::new();
    for n in 0..3 {
        let tx = tx.clone();
        producers.push(tokio::spawn(async move {
            tx.send(PollResult::text(item, format!("sample {n}"))).await.unwrap();
        }));
    }
    drop(tx);
    for p in producers {
        p.await.unwrap();
    }
    assert_eq!(writer.await.unwrap().unwrap(), 3);
    assert_eq!(text_values(&repo, item).await.len(), 3);
}

#[tokio::test]
async fn traffic_rows_are_appended() {
    let (_dir, repo) = temp_repo().await;
    let mut tx = repo.pool().begin().await.unwrap();
    let sample = TrafficSample {
        serial: "ZTEGC0000001".into(),
        upload_kbps: 100,
        download_kbps: 2_000,
        upload_pps: 10,
        download_pps: 200,
    };
    InventoryRepo::insert_traffic(&mut tx, &sample, now_ms()).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(traffic_samples(&repo).await, vec![sample]);
}

#[tokio::test]
async fn pending_rows_are_counted_and_marked() {
    let (_dir, repo) = temp_repo().await;
    for ip in ["10.0.0.1", "10.0.0.1", "10.0.0.2"] {
        sqlx::query("INSERT INTO pending_onu (host_ip, synced) VALUES ($1, 0)")
            .bind(ip)
            .execute(repo.pool())
            .await
            .unwrap();
    }
    let ip = "10.0.0.1".parse().unwrap();
    assert_eq!(repo.count_unsynced(ip).await.unwrap(), 2);
    assert_eq!(repo.mark_synced(ip).await.unwrap(), 2);
    assert_eq!(repo.count_unsynced(ip).await.unwrap(), 0);
    assert_eq!(count(&repo, "SELECT COUNT(*) FROM pending_onu WHERE synced = 0").await, 1);
}
