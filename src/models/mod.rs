// Domain models

mod host;
mod item;
mod measurement;

pub use host::{CredentialNeed, Host, HostId, HostInfoBlob, Vendor, pollable_hosts};
pub use item::{InventoryItem, ItemId, names};
pub use measurement::{MeasureValue, Observation, PollResult, TableKind, TrafficSample};
