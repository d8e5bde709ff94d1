//! Maps raw M-Bus slots onto the telegram's commodity attributes.

use log::{debug, warn};

use super::structs::{CommodityReading, Telegram};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Commodity {
    SlaveElectricity,
    Gas,
    Water,
    Heat,
    Cold,
}

/// EN 13757 device types carried by the slot's `24.1.0` line, with the
/// unit a reading of that medium must report in.
fn classify(device_type: u32) -> Option<(Commodity, &'static str)> {
    match device_type {
        2 => Some((Commodity::SlaveElectricity, "kWh")),
        3 => Some((Commodity::Gas, "m3")),
        4 => Some((Commodity::Heat, "GJ")),
        6 | 7 => Some((Commodity::Water, "m3")),
        10 | 11 => Some((Commodity::Cold, "GJ")),
        _ => None,
    }
}

/// Walks the slot table in slot-index order and fills each commodity
/// bucket from the first slot of its device type. Later slots of the
/// same type are stale or misconfigured duplicates and are skipped, not
/// overwritten. A reading in the wrong unit downgrades the telegram but
/// the value is still recorded.
pub(crate) fn normalize(telegram: &mut Telegram) {
    let slots: Vec<u8> = telegram.mbus_events.keys().copied().collect();

    for slot in slots {
        let event = telegram.mbus_events[&slot].clone();
        let device_type = match event.device_type {
            Some(device_type) => device_type,
            None => continue,
        };
        let (commodity, expected_unit) = match classify(device_type) {
            Some(entry) => entry,
            None => {
                debug!("Slot {} has unmapped device type {}", slot, device_type);
                continue;
            }
        };

        let bucket = match commodity {
            Commodity::SlaveElectricity => &mut telegram.slave_emeter,
            Commodity::Gas => &mut telegram.gas,
            Commodity::Water => &mut telegram.water,
            Commodity::Heat => &mut telegram.heat,
            Commodity::Cold => &mut telegram.cold,
        };
        if bucket.is_some() {
            debug!(
                "Slot {} duplicates an already populated {:?} reading, ignored",
                slot, commodity
            );
            continue;
        }

        *bucket = Some(CommodityReading {
            equipment_id: event.equipment_id.clone(),
            timestamp: event.timestamp,
            value: event.value,
        });

        if let Some(unit) = &event.unit {
            if unit != expected_unit {
                warn!(
                    "Slot {} reports {:?} in '{}' instead of '{}'",
                    slot, commodity, unit, expected_unit
                );
                telegram.syntax_error = true;
            }
        }
    }
}
