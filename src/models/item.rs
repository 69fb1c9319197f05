// Inventory items: named sub-components of a host (cards, fans, ONUs...).

use super::HostId;

pub type ItemId = i64;

#[derive(Debug, Clone, PartialEq)]
pub struct InventoryItem {
    pub id: ItemId,
    pub host_id: HostId,
    /// Stable index: SNMP sub-identifier suffix or a device-level constant.
    pub index: String,
    pub name: String,
    /// Legacy correlation id extracted from the vendor naming convention.
    pub oldid: Option<String>,
    pub serial: Option<String>,
    pub active: bool,
}

/// Item names written by the poll tasks.
pub mod names {
    pub const CLOCK: &str = "clock";
    pub const DEVMODEL: &str = "devmodel";
    pub const TEMPERATURE: &str = "temperature";
    pub const UPTIME: &str = "uptime";

    pub const ONU_SN: &str = "onu-sn";
    pub const ONU_ETHLIST: &str = "onu-ethlist";
    pub const ONU_NAME: &str = "onu-name";
    pub const ONU_TX: &str = "onu-tx";
    pub const ONU_RX: &str = "onu-rx";
    pub const ONU_STATUS: &str = "onu-status";

    /// Every kind created for a discovered ONU.
    pub const ONU_KINDS: [&str; 6] = [ONU_SN, ONU_ETHLIST, ONU_NAME, ONU_TX, ONU_RX, ONU_STATUS];

    pub fn card_type(slot: &str) -> String {
        format!("card-type-{slot}")
    }

    pub fn card_status(slot: &str) -> String {
        format!("card-status-{slot}")
    }

    pub fn card_cpuload(slot: &str) -> String {
        format!("card-cpuload-{slot}")
    }

    pub fn fan(n: &str) -> String {
        format!("fan-{n}")
    }
}
