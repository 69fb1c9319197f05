// ICMP liveness probe run before opening SNMP or terminal sessions.

use crate::error::{PollError, Result};
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

pub const PROBE_COUNT: usize = 3;
pub const MIN_REPLIES: usize = 2;

const ECHO_TIMEOUT: Duration = Duration::from_secs(1);
const PAYLOAD: [u8; 32] = [0; 32];

/// Sends `PROBE_COUNT` echo requests sequentially and returns how many were answered.
pub async fn probe(ip: IpAddr) -> usize {
    let mut replies = 0;
    for seq in 0..PROBE_COUNT {
        match tokio::time::timeout(ECHO_TIMEOUT, surge_ping::ping(ip, &PAYLOAD)).await {
            Ok(Ok((_, rtt))) => {
                debug!(%ip, seq, rtt_ms = rtt.as_secs_f64() * 1000.0, "echo reply");
                replies += 1;
            }
            Ok(Err(e)) => debug!(%ip, seq, error = %e, "echo failed"),
            Err(_) => debug!(%ip, seq, "echo timed out"),
        }
    }
    replies
}

pub async fn ensure_reachable(ip: IpAddr) -> Result<()> {
    let replies = probe(ip).await;
    if replies < MIN_REPLIES {
        return Err(PollError::Reachability {
            host: ip.to_string(),
            reason: format!("{replies}/{PROBE_COUNT} echo replies"),
        });
    }
    Ok(())
}
