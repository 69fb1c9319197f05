// Device transports: ICMP probe, SNMP v2c, telnet CLI.

pub mod icmp;
pub mod snmp;
pub mod terminal;

use crate::models::Host;
use snmp::{SnmpClient, SnmpOptions};
use terminal::{LoginStep, TerminalSession};
use tokio::net::TcpStream;

/// Ports and probe policy shared by every session a task opens.
#[derive(Debug, Clone, Copy)]
pub struct TransportSettings {
    pub telnet_port: u16,
    pub snmp_port: u16,
    pub verify_reachable: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            telnet_port: terminal::DEFAULT_PORT,
            snmp_port: snmp::DEFAULT_PORT,
            verify_reachable: true,
        }
    }
}

impl TransportSettings {
    /// SNMP session with the host community. `probe` is ANDed with `verify_reachable`.
    pub async fn open_snmp(
        &self,
        host: &Host,
        max_oids: usize,
        max_repetitions: u32,
        probe: bool,
    ) -> crate::error::Result<SnmpClient> {
        let opts = SnmpOptions::new(host.snmp_community.clone(), max_oids, max_repetitions)
            .with_port(self.snmp_port)
            .with_verify_reachable(self.verify_reachable && probe);
        SnmpClient::connect(host.ip, opts).await
    }

    pub async fn open_terminal(
        &self,
        host: &Host,
        script: &[LoginStep],
    ) -> crate::error::Result<TerminalSession<TcpStream>> {
        TerminalSession::connect(host.ip, self.telnet_port, script, self.verify_reachable).await
    }
}
