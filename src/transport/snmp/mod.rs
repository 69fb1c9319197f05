// SNMPv2c client over UDP: GET, GETBULK, subtree walk and deadline-bounded table pagination.

pub mod ber;
pub mod oid;

pub use ber::{SnmpValue, VarBind};
pub use oid::Oid;

use crate::error::{PollError, Result};
use crate::transport::icmp;
use ber::{Message, PduType};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_PORT: u16 = 161;

const MAX_DATAGRAM: usize = 65_535;

#[derive(Debug, Clone)]
pub struct SnmpOptions {
    pub port: u16,
    pub community: String,
    /// Upper bound on varbinds per GET request.
    pub max_oids: usize,
    pub max_repetitions: u32,
    pub verify_reachable: bool,
    /// First attempt timeout; doubled on every retry.
    pub timeout: Duration,
    pub retries: u32,
}

impl SnmpOptions {
    pub fn new(community: impl Into<String>, max_oids: usize, max_repetitions: u32) -> Self {
        Self {
            port: DEFAULT_PORT,
            community: community.into(),
            max_oids: max_oids.max(1),
            max_repetitions: max_repetitions.max(1),
            verify_reachable: true,
            timeout: Duration::from_secs(2),
            retries: 2,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_verify_reachable(mut self, verify: bool) -> Self {
        self.verify_reachable = verify;
        self
    }
}

pub struct SnmpClient {
    socket: UdpSocket,
    peer: SocketAddr,
    opts: SnmpOptions,
    next_request_id: i32,
}

impl SnmpClient {
    pub async fn connect(ip: IpAddr, opts: SnmpOptions) -> Result<Self> {
        if opts.verify_reachable {
            icmp::ensure_reachable(ip).await?;
        }
        let local: SocketAddr = match ip {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let peer = SocketAddr::new(ip, opts.port);
        let socket = UdpSocket::bind(local).await?;
        socket.connect(peer).await?;

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(1);
        Ok(Self {
            socket,
            peer,
            opts,
            next_request_id: (seed & 0x3FFF_FFFF) as i32,
        })
    }

    pub fn max_repetitions(&self) -> u32 {
        self.opts.max_repetitions
    }

    /// GET in chunks of `max_oids`; any transport error fails the whole call.
    pub async fn get(&mut self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        let mut out = Vec::with_capacity(oids.len());
        for chunk in oids.chunks(self.opts.max_oids) {
            out.extend(self.exchange(PduType::Get, 0, 0, chunk).await?);
        }
        Ok(out)
    }

    pub async fn get_bulk(
        &mut self,
        oids: &[Oid],
        non_repeaters: u32,
        max_repetitions: u32,
    ) -> Result<Vec<VarBind>> {
        self.exchange(
            PduType::GetBulk,
            i64::from(non_repeaters),
            i64::from(max_repetitions),
            oids,
        )
        .await
    }

    /// Every binding under `root`, fetched page by page until the agent leaves the subtree.
    pub async fn bulk_walk_all(&mut self, root: &Oid) -> Result<Vec<VarBind>> {
        let mut out = Vec::new();
        let mut cursor = root.clone();
        loop {
            let page = self
                .get_bulk(std::slice::from_ref(&cursor), 0, self.opts.max_repetitions)
                .await?;
            if page.is_empty() {
                return Ok(out);
            }
            for vb in page {
                if vb.value.is_exception() || !vb.name.starts_with(root) {
                    return Ok(out);
                }
                if vb.name <= cursor {
                    return Err(PollError::protocol(format!(
                        "{}: oid {} does not increase past {}",
                        self.peer, vb.name, cursor
                    )));
                }
                cursor = vb.name.clone();
                out.push(vb);
            }
        }
    }

    fn next_id(&mut self) -> i32 {
        self.next_request_id = self.next_request_id.wrapping_add(1) & 0x7FFF_FFFF;
        self.next_request_id
    }

    async fn exchange(
        &mut self,
        pdu_type: PduType,
        field1: i64,
        field2: i64,
        oids: &[Oid],
    ) -> Result<Vec<VarBind>> {
        let request_id = self.next_id();
        let packet = ber::encode(&Message {
            community: self.opts.community.as_bytes().to_vec(),
            pdu_type,
            request_id,
            field1,
            field2,
            varbinds: oids.iter().cloned().map(VarBind::null).collect(),
        });

        let started = Instant::now();
        let mut wait = self.opts.timeout;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        for attempt in 0..=self.opts.retries {
            self.socket.send(&packet).await?;
            let deadline = Instant::now() + wait;
            loop {
                let n = match tokio::time::timeout_at(deadline, self.socket.recv(&mut buf)).await {
                    Ok(received) => received?,
                    Err(_) => break,
                };
                let resp = match ber::decode(&buf[..n]) {
                    Ok(resp) => resp,
                    Err(e) => {
                        debug!(peer = %self.peer, error = %e, "discarding undecodable datagram");
                        continue;
                    }
                };
                if resp.pdu_type != PduType::Response || resp.request_id != request_id {
                    continue;
                }
                if resp.error_status() != 0 {
                    return Err(PollError::protocol(format!(
                        "{}: error-status {} at index {}",
                        self.peer,
                        resp.error_status(),
                        resp.error_index()
                    )));
                }
                return Ok(resp.varbinds);
            }
            debug!(peer = %self.peer, attempt, wait_ms = wait.as_millis() as u64, "snmp request timed out");
            wait *= 2;
        }
        Err(PollError::timeout(
            format!("snmp {pdu_type:?} to {}", self.peer),
            started.elapsed(),
        ))
    }
}

/// One GETBULK page starting after `cursor`. Lets pagination run against fakes in tests.
pub trait BulkSource {
    fn get_bulk_page(
        &mut self,
        cursor: &Oid,
        max_repetitions: u32,
    ) -> impl Future<Output = Result<Vec<VarBind>>> + Send;
}

impl BulkSource for SnmpClient {
    async fn get_bulk_page(&mut self, cursor: &Oid, max_repetitions: u32) -> Result<Vec<VarBind>> {
        self.get_bulk(std::slice::from_ref(cursor), 0, max_repetitions)
            .await
    }
}

/// Rows collected by [`walk_table`]. `complete` is false when the deadline cut the walk short.
#[derive(Debug, Default)]
pub struct TableWalk {
    /// (index under the table base, value) in walk order.
    pub rows: Vec<(String, SnmpValue)>,
    pub complete: bool,
    pub pages: usize,
}

/// Manually paginated table walk. Stops on a short page, on the first name outside `base`,
/// or at `deadline` (partial rows kept, `complete = false`).
pub async fn walk_table<S: BulkSource>(
    source: &mut S,
    base: &Oid,
    max_repetitions: u32,
    deadline: Instant,
) -> Result<TableWalk> {
    let max_repetitions = max_repetitions.max(1);
    let mut walk = TableWalk::default();
    let mut cursor = base.clone();
    loop {
        if Instant::now() >= deadline {
            warn!(table = %base, rows = walk.rows.len(), "table walk deadline reached");
            return Ok(walk);
        }
        let page = match tokio::time::timeout_at(
            deadline,
            source.get_bulk_page(&cursor, max_repetitions),
        )
        .await
        {
            Ok(page) => page?,
            Err(_) => {
                warn!(table = %base, rows = walk.rows.len(), "table walk deadline reached");
                return Ok(walk);
            }
        };
        walk.pages += 1;

        let page_len = page.len();
        let mut left_subtree = false;
        for vb in page {
            if vb.value.is_exception() {
                left_subtree = true;
                break;
            }
            let Some(index) = vb.name.index_under(base) else {
                left_subtree = true;
                break;
            };
            if vb.name <= cursor {
                return Err(PollError::protocol(format!(
                    "table {base}: oid {} does not increase past {cursor}",
                    vb.name
                )));
            }
            cursor = vb.name;
            walk.rows.push((index, vb.value));
        }

        if left_subtree || page_len < max_repetitions as usize {
            walk.complete = true;
            return Ok(walk);
        }
    }
}
