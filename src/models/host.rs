// Polled device (OLT) as loaded from the host table.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

pub type HostId = i64;

/// Vendor family. Resolved once from the terminal username convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Zte,
    Vsol,
    Cdata,
}

impl Vendor {
    /// Hosts provisioned with user "vsol"/"cdata" belong to those families; everything else is ZTE.
    pub fn from_username(username: &str) -> Self {
        match username.trim().to_lowercase().as_str() {
            "vsol" => Vendor::Vsol,
            "cdata" => Vendor::Cdata,
            _ => Vendor::Zte,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Zte => "zte",
            Vendor::Vsol => "vsol",
            Vendor::Cdata => "cdata",
        }
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON blob stored in `host.info`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HostInfoBlob {
    #[serde(default)]
    pub telnet_username: Option<String>,
    #[serde(default)]
    pub telnet_password: Option<String>,
    #[serde(default)]
    pub snmp_read_community: Option<String>,
}

/// Which credentials a task needs before a worker may be spawned for a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialNeed {
    /// Terminal username + password.
    Terminal,
    /// Terminal username + SNMP read community.
    Snmp,
    /// Terminal username + password + SNMP read community.
    TerminalAndSnmp,
}

#[derive(Debug, Clone)]
pub struct Host {
    pub id: HostId,
    pub ip: IpAddr,
    pub name: String,
    pub telnet_username: String,
    pub telnet_password: String,
    pub snmp_community: String,
    pub vendor: Vendor,
    pub active: bool,
}

impl Host {
    pub fn new(id: HostId, ip: IpAddr, name: String, info: HostInfoBlob, active: bool) -> Self {
        let telnet_username = info.telnet_username.unwrap_or_default();
        let vendor = Vendor::from_username(&telnet_username);
        Self {
            id,
            ip,
            name,
            telnet_password: info.telnet_password.unwrap_or_default(),
            snmp_community: info.snmp_read_community.unwrap_or_default(),
            telnet_username,
            vendor,
            active,
        }
    }

    pub fn has_credentials(&self, need: CredentialNeed) -> bool {
        let user = !self.telnet_username.is_empty();
        let pass = !self.telnet_password.is_empty();
        let community = !self.snmp_community.is_empty();
        match need {
            CredentialNeed::Terminal => user && pass,
            CredentialNeed::Snmp => user && community,
            CredentialNeed::TerminalAndSnmp => user && pass && community,
        }
    }

    /// Active and carrying the credentials `need` asks for.
    pub fn is_pollable(&self, need: CredentialNeed) -> bool {
        self.active && self.has_credentials(need)
    }
}

/// Hosts a fleet run may spawn workers for.
pub fn pollable_hosts(hosts: Vec<Host>, need: CredentialNeed) -> Vec<Host> {
    hosts.into_iter().filter(|h| h.is_pollable(need)).collect()
}
