use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// One decoded P1 telegram.
///
/// Every register the meter did not transmit stays `None`; absence is a
/// normal state and is never collapsed to zero. The struct is built
/// fresh for each decode call and not mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Telegram {
    /// True when no syntax error occurred and the checksum is either
    /// valid or absent by protocol design.
    pub is_valid: bool,
    /// True when the trailing checksum matched. False when it
    /// mismatched, and also when the record carries none.
    pub is_valid_checksum: bool,

    /// The identification line, without its leading `/`.
    pub ident: String,
    /// Three-letter equipment brand tag taken from the identification.
    pub equipment_brand_tag: String,
    /// Model/device part of the identification.
    pub device_id: String,
    /// The four checksum digits, absent in the oldest protocol revision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crc: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub p1_version: Option<String>,
    /// Belgian meters report their version under a separate reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p1_version_be: Option<String>,
    /// The meter's own clock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<FixedOffset>>,
    /// Wall-clock time at which this telegram was decoded. Assigned by
    /// the assembler, independent of the meter clock.
    pub received_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub electricity_received_tariff1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub electricity_received_tariff2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub electricity_returned_tariff1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub electricity_returned_tariff2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tariff_indicator: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_received: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_returned: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_failures: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_power_failures: Option<u32>,
    /// Outage history, most recent first as the meter reports it.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub power_failure_log: Vec<PowerFailureEvent>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage_sags_l1: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage_sags_l2: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage_sags_l3: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage_swells_l1: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage_swells_l2: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage_swells_l3: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage_l1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage_l2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage_l3: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_l1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_l2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_l3: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_received_l1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_received_l2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_received_l3: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_returned_l1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_returned_l2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_returned_l3: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Raw M-Bus slot table, keyed by slot index. Kept in index order so
    /// normalization is deterministic; stays populated even for slots
    /// that also fed a commodity attribute.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub mbus_events: BTreeMap<u8, MbusEvent>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub slave_emeter: Option<CommodityReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<CommodityReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water: Option<CommodityReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heat: Option<CommodityReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cold: Option<CommodityReading>,

    #[serde(skip)]
    pub(crate) syntax_error: bool,
}

impl Telegram {
    pub(crate) fn new() -> Self {
        Telegram {
            is_valid: false,
            is_valid_checksum: false,
            ident: String::new(),
            equipment_brand_tag: String::new(),
            device_id: String::new(),
            crc: None,
            p1_version: None,
            p1_version_be: None,
            timestamp: None,
            received_at: Utc::now(),
            equipment_id: None,
            electricity_received_tariff1: None,
            electricity_received_tariff2: None,
            electricity_returned_tariff1: None,
            electricity_returned_tariff2: None,
            tariff_indicator: None,
            power_received: None,
            power_returned: None,
            power_failures: None,
            long_power_failures: None,
            power_failure_log: Vec::new(),
            voltage_sags_l1: None,
            voltage_sags_l2: None,
            voltage_sags_l3: None,
            voltage_swells_l1: None,
            voltage_swells_l2: None,
            voltage_swells_l3: None,
            voltage_l1: None,
            voltage_l2: None,
            voltage_l3: None,
            current_l1: None,
            current_l2: None,
            current_l3: None,
            power_received_l1: None,
            power_received_l2: None,
            power_received_l3: None,
            power_returned_l1: None,
            power_returned_l2: None,
            power_returned_l3: None,
            message_code: None,
            message: None,
            mbus_events: BTreeMap::new(),
            slave_emeter: None,
            gas: None,
            water: None,
            heat: None,
            cold: None,
            syntax_error: false,
        }
    }
}

/// One multiplexed secondary-meter slot. The device type, equipment id
/// and reading arrive on separate lines and may be interleaved with
/// other slots, so every member is optional while the slot accumulates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MbusEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// A commodity attribute derived from the slot table: the first slot of
/// a device type feeds the matching bucket (gas, water, heat, cold or a
/// slave electricity meter).
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommodityReading {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// One historical outage from the power failure event log.
#[derive(Debug, Clone, Serialize)]
pub struct PowerFailureEvent {
    /// Derived: end time minus duration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<FixedOffset>>,
    pub duration_seconds: u64,
}
