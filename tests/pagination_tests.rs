// Manual GETBULK pagination against in-memory agents

use oltpoller::error::{PollError, Result};
use oltpoller::transport::snmp::{BulkSource, Oid, SnmpValue, VarBind, walk_table};
use std::time::Duration;
use tokio::time::Instant;

/// Sorted MIB view; answers like an agent would, running past the table into later objects.
struct FakeAgent {
    view: Vec<VarBind>,
    requests: usize,
}

impl FakeAgent {
    fn new(mut view: Vec<VarBind>) -> Self {
        view.sort_by(|a, b| a.name.cmp(&b.name));
        Self { view, requests: 0 }
    }
}

impl BulkSource for FakeAgent {
    async fn get_bulk_page(&mut self, cursor: &Oid, max_repetitions: u32) -> Result<Vec<VarBind>> {
        self.requests += 1;
        let mut page: Vec<VarBind> = self
            .view
            .iter()
            .filter(|vb| vb.name > *cursor)
            .take(max_repetitions as usize)
            .cloned()
            .collect();
        if page.len() < max_repetitions as usize {
            let last = page.last().map_or_else(|| cursor.clone(), |vb| vb.name.clone());
            page.push(VarBind {
                name: last,
                value: SnmpValue::EndOfMibView,
            });
        }
        Ok(page)
    }
}

fn oid(s: &str) -> Oid {
    s.parse().unwrap()
}

fn row(s: &str, v: i64) -> VarBind {
    VarBind {
        name: oid(s),
        value: SnmpValue::Integer(v),
    }
}

const BASE: &str = ".1.3.6.1.4.1.3902.1082.500.10.2.3.8.1.4";

fn table(n: usize) -> Vec<VarBind> {
    (1..=n)
        .map(|i| row(&format!("{BASE}.268501248.{i}"), i as i64))
        .collect()
}

fn far_deadline() -> Instant {
    Instant::now() + Duration::from_secs(30)
}

#[tokio::test]
async fn exactly_one_full_page_takes_a_second_request_and_stops() {
    let mut view = table(5);
    view.push(row(".1.3.6.1.4.1.3902.1082.500.10.2.3.8.1.5.268501248.1", 9));
    let mut agent = FakeAgent::new(view);

    let walk = walk_table(&mut agent, &oid(BASE), 5, far_deadline()).await.unwrap();
    assert!(walk.complete);
    assert_eq!(walk.pages, 2);
    assert_eq!(agent.requests, 2);
    assert_eq!(walk.rows.len(), 5);
    assert_eq!(walk.rows[0].0, "268501248.1");
    assert_eq!(walk.rows[4], ("268501248.5".to_string(), SnmpValue::Integer(5)));
}

#[tokio::test]
async fn full_page_at_end_of_mib_stops() {
    let mut agent = FakeAgent::new(table(4));
    let walk = walk_table(&mut agent, &oid(BASE), 4, far_deadline()).await.unwrap();
    assert!(walk.complete);
    assert_eq!(agent.requests, 2);
    assert_eq!(walk.rows.len(), 4);
}

#[tokio::test]
async fn short_page_stops_immediately() {
    let mut view = table(3);
    view.push(row(".1.3.6.1.4.1.3902.1082.500.10.2.3.8.1.5.1", 1));
    let mut agent = FakeAgent::new(view);
    let walk = walk_table(&mut agent, &oid(BASE), 10, far_deadline()).await.unwrap();
    assert!(walk.complete);
    assert_eq!(agent.requests, 1);
    assert_eq!(walk.rows.len(), 3);
}

#[tokio::test]
async fn large_table_spans_pages_in_order() {
    let mut agent = FakeAgent::new(table(47));
    let walk = walk_table(&mut agent, &oid(BASE), 10, far_deadline()).await.unwrap();
    assert!(walk.complete);
    assert_eq!(walk.rows.len(), 47);
    assert_eq!(agent.requests, 5);
    let values: Vec<i64> = walk.rows.iter().filter_map(|(_, v)| v.as_i64()).collect();
    assert_eq!(values, (1..=47).collect::<Vec<i64>>());
}

/// Agent that keeps answering with the same row.
struct StuckAgent;

impl BulkSource for StuckAgent {
    async fn get_bulk_page(&mut self, _cursor: &Oid, max_repetitions: u32) -> Result<Vec<VarBind>> {
        Ok((0..max_repetitions).map(|_| row(&format!("{BASE}.5"), 0)).collect())
    }
}

#[tokio::test]
async fn non_increasing_names_are_a_protocol_error() {
    let err = walk_table(&mut StuckAgent, &oid(BASE), 3, far_deadline())
        .await
        .unwrap_err();
    assert!(matches!(err, PollError::Protocol(_)));
}

/// Endless table, one page per second.
struct SlowEndlessAgent {
    next: u32,
}

impl BulkSource for SlowEndlessAgent {
    async fn get_bulk_page(&mut self, _cursor: &Oid, max_repetitions: u32) -> Result<Vec<VarBind>> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let page = (0..max_repetitions)
            .map(|i| row(&format!("{BASE}.{}", self.next + i + 1), 1))
            .collect();
        self.next += max_repetitions;
        Ok(page)
    }
}

#[tokio::test(start_paused = true)]
async fn deadline_returns_partial_rows() {
    let mut agent = SlowEndlessAgent { next: 0 };
    let started = Instant::now();
    let walk = walk_table(
        &mut agent,
        &oid(BASE),
        10,
        started + Duration::from_millis(3_500),
    )
    .await
    .unwrap();
    assert!(!walk.complete);
    assert_eq!(walk.rows.len(), 30);
    assert!(started.elapsed() <= Duration::from_millis(3_500));
}
