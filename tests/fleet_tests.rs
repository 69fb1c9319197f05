// Fleet fan-out: per-host outcomes are counted, one bad host never stops the rest

mod common;

use common::info;
use oltpoller::error::PollError;
use oltpoller::fleet::{FleetReport, run_fleet};
use oltpoller::models::Host;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn host(id: i64, name: &str) -> Host {
    let ip = format!("10.1.0.{id}").parse().unwrap();
    Host::new(id, ip, name.to_string(), info("zte", "pw", "c"), true)
}

#[tokio::test(start_paused = true)]
async fn mixed_outcomes_are_counted_and_siblings_finish() {
    let hosts = vec![
        host(1, "ok-a"),
        host(2, "broken"),
        host(3, "stuck"),
        host(4, "crashing"),
        host(5, "ok-b"),
    ];
    let finished = Arc::new(AtomicUsize::new(0));

    let report = run_fleet("test", hosts, Duration::from_secs(5), |host| {
        let finished = finished.clone();
        async move {
            match host.name.as_str() {
                "broken" => Err(PollError::protocol("refused")),
                "stuck" => {
                    tokio::time::sleep(Duration::from_secs(600)).await;
                    Ok(())
                }
                "crashing" => panic!("worker bug"),
                _ => {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }
        }
    })
    .await;

    assert_eq!(
        report,
        FleetReport {
            ok: 2,
            failed: 1,
            timed_out: 1,
            panicked: 1,
        }
    );
    assert_eq!(report.total(), 5);
    assert_eq!(finished.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn workers_run_concurrently() {
    let hosts = (1..=8).map(|i| host(i, &format!("olt-{i}"))).collect();
    let started = tokio::time::Instant::now();
    let report = run_fleet("test", hosts, Duration::from_secs(10), |_| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        Ok(())
    })
    .await;
    assert_eq!(report.ok, 8);
    assert!(started.elapsed() < Duration::from_secs(6));
}

#[tokio::test]
async fn empty_fleet_is_a_no_op() {
    let report = run_fleet("test", Vec::new(), Duration::from_secs(1), |_| async { Ok(()) }).await;
    assert_eq!(report.total(), 0);
}
