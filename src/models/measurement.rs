// Measurement values and transient poll results.

use super::ItemId;

/// Which measurement table a value lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Numeric,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MeasureValue {
    Numeric(f64),
    Text(String),
}

impl MeasureValue {
    pub fn kind(&self) -> TableKind {
        match self {
            MeasureValue::Numeric(_) => TableKind::Numeric,
            MeasureValue::Text(_) => TableKind::Text,
        }
    }
}

/// One observation bound to an inventory item; consumed once by the persistor.
#[derive(Debug, Clone, PartialEq)]
pub struct PollResult {
    pub item_id: ItemId,
    pub value: MeasureValue,
}

impl PollResult {
    pub fn numeric(item_id: ItemId, value: f64) -> Self {
        Self {
            item_id,
            value: MeasureValue::Numeric(value),
        }
    }

    pub fn text(item_id: ItemId, value: impl Into<String>) -> Self {
        Self {
            item_id,
            value: MeasureValue::Text(value.into()),
        }
    }

    pub fn kind(&self) -> TableKind {
        self.value.kind()
    }
}

/// Raw reading from a device before it is tied to an item id.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub index: String,
    pub name: String,
    pub value: MeasureValue,
}

impl Observation {
    pub fn numeric(index: impl Into<String>, name: impl Into<String>, value: f64) -> Self {
        Self {
            index: index.into(),
            name: name.into(),
            value: MeasureValue::Numeric(value),
        }
    }

    pub fn text(index: impl Into<String>, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            name: name.into(),
            value: MeasureValue::Text(value.into()),
        }
    }
}

/// Per-ONU traffic rates for one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrafficSample {
    pub serial: String,
    pub upload_kbps: i64,
    pub download_kbps: i64,
    pub upload_pps: i64,
    pub download_pps: i64,
}
