//! Telegram decoding: data model, grammar parser, slot normalization
//! and the assembler that ties them together.

use chrono::Utc;
use log::debug;

use crate::checksum;

mod normalizer;
mod parser;
pub mod structs;

pub use structs::{CommodityReading, MbusEvent, PowerFailureEvent, Telegram};

/// Decodes one telegram record.
///
/// Returns `None` only for empty input — "no telegram" is distinct from
/// "telegram present but invalid". Malformed content never produces an
/// error: the returned telegram carries partial data plus the validity
/// flags, so the caller decides whether to discard, log, or use it.
///
/// The call is a pure function over its input (plus the receipt clock);
/// independent streams can decode concurrently without coordination.
pub fn decode(raw: &str) -> Option<Telegram> {
    if raw.is_empty() {
        return None;
    }

    let mut telegram = parser::parse_telegram(raw);
    telegram.is_valid_checksum = checksum::is_valid(raw);
    normalizer::normalize(&mut telegram);
    telegram.is_valid =
        !telegram.syntax_error && (telegram.crc.is_none() || telegram.is_valid_checksum);
    telegram.received_at = Utc::now();

    debug!(
        "Decoded telegram from {}: valid={}, checksum_valid={}",
        telegram.equipment_brand_tag, telegram.is_valid, telegram.is_valid_checksum
    );
    Some(telegram)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    const TELEGRAM_GAS: &str = concat!(
        "/ISk5\\2MT382-1000\r\n",
        "\r\n",
        "1-3:0.2.8(42)\r\n",
        "0-0:1.0.0(101209113020W)\r\n",
        "0-0:96.1.1(4B384547303034303436333935353037)\r\n",
        "1-0:1.8.1(123456.789*kWh)\r\n",
        "1-0:1.8.2(123456.789*kWh)\r\n",
        "1-0:2.8.1(123456.789*kWh)\r\n",
        "1-0:2.8.2(123456.789*kWh)\r\n",
        "0-0:96.14.0(0002)\r\n",
        "1-0:1.7.0(01.193*kW)\r\n",
        "1-0:2.7.0(00.000*kW)\r\n",
        "0-0:96.7.21(00004)\r\n",
        "0-0:96.7.9(00002)\r\n",
        "1-0:99.97.0(2)(0-0:96.7.19)(101208152415W)(0000000240*s)(101208151004W)(0000000301*s)\r\n",
        "1-0:32.32.0(00002)\r\n",
        "1-0:32.36.0(00000)\r\n",
        "0-0:96.13.0()\r\n",
        "1-0:31.7.0(001*A)\r\n",
        "1-0:21.7.0(01.111*kW)\r\n",
        "1-0:22.7.0(02.222*kW)\r\n",
        "0-1:24.1.0(003)\r\n",
        "0-1:96.1.0(3232323241424344313233343536373839)\r\n",
        "0-1:24.2.1(101209112500W)(12785.123*m3)\r\n",
        "!A60B\r\n",
    );

    // Three-phase ESMR 5.0 record with the Belgian version register.
    const TELEGRAM_THREE_PHASE: &str = concat!(
        "/Ene5\\T210-D ESMR5.0\r\n",
        "\r\n",
        "1-3:0.2.8(50)\r\n",
        "0-0:96.1.4(50217)\r\n",
        "0-0:1.0.0(180417201458S)\r\n",
        "0-0:96.1.1(4530303437303030303037363330383137)\r\n",
        "1-0:1.8.1(000051.775*kWh)\r\n",
        "1-0:1.8.2(000000.000*kWh)\r\n",
        "1-0:2.8.1(000024.413*kWh)\r\n",
        "1-0:2.8.2(000000.000*kWh)\r\n",
        "0-0:96.14.0(0001)\r\n",
        "1-0:1.7.0(00.335*kW)\r\n",
        "1-0:2.7.0(00.000*kW)\r\n",
        "0-0:96.7.21(00003)\r\n",
        "0-0:96.7.9(00001)\r\n",
        "1-0:99.97.0(1)(0-0:96.7.19)(180417201458S)(0000000546*s)\r\n",
        "1-0:32.32.0(00000)\r\n",
        "1-0:52.32.0(00000)\r\n",
        "1-0:72.32.0(00000)\r\n",
        "1-0:32.36.0(00000)\r\n",
        "1-0:52.36.0(00000)\r\n",
        "1-0:72.36.0(00000)\r\n",
        "0-0:96.13.0()\r\n",
        "1-0:32.7.0(229.0*V)\r\n",
        "1-0:52.7.0(229.2*V)\r\n",
        "1-0:72.7.0(229.9*V)\r\n",
        "1-0:31.7.0(001*A)\r\n",
        "1-0:51.7.0(000*A)\r\n",
        "1-0:71.7.0(002*A)\r\n",
        "1-0:21.7.0(00.335*kW)\r\n",
        "1-0:41.7.0(00.000*kW)\r\n",
        "1-0:61.7.0(00.000*kW)\r\n",
        "1-0:22.7.0(00.000*kW)\r\n",
        "1-0:42.7.0(00.000*kW)\r\n",
        "1-0:62.7.0(00.000*kW)\r\n",
        "!BA70\r\n",
    );

    #[test]
    fn test_decode_empty_is_no_telegram() {
        assert!(decode("").is_none());
    }

    #[test]
    fn test_decode_whitespace_is_an_invalid_telegram() {
        let telegram = decode(" ").unwrap();
        assert!(!telegram.is_valid);
        assert!(!telegram.is_valid_checksum);
        assert!(telegram.ident.is_empty());
    }

    #[test]
    fn test_decode_gas_telegram() {
        let telegram = decode(TELEGRAM_GAS).unwrap();

        assert!(telegram.is_valid);
        assert!(telegram.is_valid_checksum);
        assert_eq!(telegram.crc.as_deref(), Some("A60B"));
        assert_eq!(telegram.ident, "ISk5\\2MT382-1000");
        assert_eq!(telegram.equipment_brand_tag, "ISK");
        assert_eq!(telegram.device_id, "MT382-1000");
        assert_eq!(telegram.p1_version.as_deref(), Some("42"));
        assert_eq!(telegram.equipment_id.as_deref(), Some("K8EG004046395507"));
        assert_eq!(telegram.electricity_received_tariff1, Some(123456.789));
        assert_eq!(telegram.power_failures, Some(4));
        assert_eq!(telegram.long_power_failures, Some(2));
        assert_eq!(telegram.power_failure_log.len(), 2);
        assert_eq!(telegram.message, None);

        let gas = telegram.gas.as_ref().unwrap();
        assert_eq!(gas.equipment_id.as_deref(), Some("2222ABCD123456789"));
        assert_eq!(gas.value, Some(12785.123));
        assert_eq!(
            gas.timestamp,
            FixedOffset::east_opt(3600)
                .unwrap()
                .with_ymd_and_hms(2010, 12, 9, 11, 25, 0)
                .single()
        );
    }

    #[test]
    fn test_decode_three_phase_telegram() {
        let telegram = decode(TELEGRAM_THREE_PHASE).unwrap();

        assert!(telegram.is_valid);
        assert_eq!(telegram.equipment_brand_tag, "ENE");
        assert_eq!(telegram.p1_version.as_deref(), Some("50"));
        assert_eq!(telegram.p1_version_be.as_deref(), Some("50217"));
        assert_eq!(telegram.voltage_l1, Some(229.0));
        assert_eq!(telegram.voltage_l2, Some(229.2));
        assert_eq!(telegram.voltage_l3, Some(229.9));
        assert_eq!(telegram.current_l2, Some(0.0));
        assert_eq!(telegram.power_received_l1, Some(0.335));
        assert_eq!(telegram.power_returned_l3, Some(0.0));
        assert_eq!(telegram.voltage_sags_l3, Some(0));
        assert_eq!(telegram.voltage_swells_l2, Some(0));
        assert_eq!(
            telegram.timestamp,
            FixedOffset::east_opt(2 * 3600)
                .unwrap()
                .with_ymd_and_hms(2018, 4, 17, 20, 14, 58)
                .single()
        );
        // no sub-meters attached
        assert!(telegram.mbus_events.is_empty());
        assert!(telegram.gas.is_none());
    }

    #[test]
    fn test_checksum_mismatch_still_decodes() {
        let corrupt = TELEGRAM_GAS.replace("!A60B", "!A60C");
        let telegram = decode(&corrupt).unwrap();

        assert!(!telegram.is_valid);
        assert!(!telegram.is_valid_checksum);
        assert_eq!(telegram.crc.as_deref(), Some("A60C"));
        // the payload is still fully extracted for diagnostics
        assert_eq!(telegram.electricity_received_tariff1, Some(123456.789));
        assert!(telegram.gas.is_some());
    }

    #[test]
    fn test_missing_checksum_is_a_valid_state() {
        // oldest protocol revision: no checksum trailer at all
        let telegram = decode(concat!(
            "/ISk5\\2MT382-1000\r\n",
            "\r\n",
            "1-0:1.8.1(123456.789*kWh)\r\n",
        ))
        .unwrap();

        assert_eq!(telegram.crc, None);
        assert!(!telegram.is_valid_checksum);
        assert!(telegram.is_valid);
        assert_eq!(telegram.electricity_received_tariff1, Some(123456.789));
    }

    #[test]
    fn test_gas_in_wrong_unit_downgrades() {
        let telegram = decode(concat!(
            "/ISk5\\2MT382-1000\r\n",
            "\r\n",
            "1-3:0.2.8(42)\r\n",
            "0-0:1.0.0(101209113020W)\r\n",
            "0-0:96.1.1(4B384547303034303436333935353037)\r\n",
            "1-0:1.8.1(123456.789*kWh)\r\n",
            "1-0:1.8.2(123456.789*kWh)\r\n",
            "1-0:2.8.1(123456.789*kWh)\r\n",
            "1-0:2.8.2(123456.789*kWh)\r\n",
            "0-0:96.14.0(0002)\r\n",
            "1-0:1.7.0(01.193*kW)\r\n",
            "1-0:2.7.0(00.000*kW)\r\n",
            "0-0:96.7.21(00004)\r\n",
            "0-0:96.7.9(00002)\r\n",
            "1-0:99.97.0(2)(0-0:96.7.19)(101208152415W)(0000000240*s)(101208151004W)(0000000301*s)\r\n",
            "1-0:32.32.0(00002)\r\n",
            "1-0:32.36.0(00000)\r\n",
            "0-0:96.13.0()\r\n",
            "1-0:31.7.0(001*A)\r\n",
            "1-0:21.7.0(01.111*kW)\r\n",
            "1-0:22.7.0(02.222*kW)\r\n",
            "0-1:24.1.0(003)\r\n",
            "0-1:96.1.0(3232323241424344313233343536373839)\r\n",
            "0-1:24.2.1(101209112500W)(12785.123*kWh)\r\n",
            "!35D0\r\n",
        ))
        .unwrap();

        assert!(!telegram.is_valid);
        assert!(telegram.is_valid_checksum);
        // the reading is still recorded
        assert_eq!(telegram.gas.as_ref().unwrap().value, Some(12785.123));
    }

    #[test]
    fn test_duplicate_gas_slots_first_wins() {
        let telegram = decode(concat!(
            "/ISk5\\2MT382-1000\r\n",
            "\r\n",
            "1-3:0.2.8(42)\r\n",
            "0-0:1.0.0(101209113020W)\r\n",
            "0-0:96.1.1(4B384547303034303436333935353037)\r\n",
            "1-0:1.8.1(123456.789*kWh)\r\n",
            "1-0:1.8.2(123456.789*kWh)\r\n",
            "1-0:2.8.1(123456.789*kWh)\r\n",
            "1-0:2.8.2(123456.789*kWh)\r\n",
            "0-0:96.14.0(0002)\r\n",
            "1-0:1.7.0(01.193*kW)\r\n",
            "1-0:2.7.0(00.000*kW)\r\n",
            "0-0:96.7.21(00004)\r\n",
            "0-0:96.7.9(00002)\r\n",
            "1-0:99.97.0(2)(0-0:96.7.19)(101208152415W)(0000000240*s)(101208151004W)(0000000301*s)\r\n",
            "1-0:32.32.0(00002)\r\n",
            "1-0:32.36.0(00000)\r\n",
            "0-0:96.13.0()\r\n",
            "1-0:31.7.0(001*A)\r\n",
            "1-0:21.7.0(01.111*kW)\r\n",
            "1-0:22.7.0(02.222*kW)\r\n",
            "0-1:24.1.0(003)\r\n",
            "0-1:96.1.0(3232323241424344313233343536373839)\r\n",
            "0-1:24.2.1(101209112500W)(12785.123*m3)\r\n",
            "0-2:24.1.0(003)\r\n",
            "0-2:96.1.0(4141414142424242)\r\n",
            "0-2:24.2.1(101209112600W)(999.999*m3)\r\n",
            "!D507\r\n",
        ))
        .unwrap();

        assert!(telegram.is_valid);
        let gas = telegram.gas.as_ref().unwrap();
        assert_eq!(gas.equipment_id.as_deref(), Some("2222ABCD123456789"));
        assert_eq!(gas.value, Some(12785.123));
        // the duplicate stays visible in the raw slot table
        assert_eq!(telegram.mbus_events[&2].value, Some(999.999));
    }

    #[test]
    fn test_received_at_is_the_decode_time() {
        let before = Utc::now();
        let telegram = decode(TELEGRAM_GAS).unwrap();
        let after = Utc::now();
        assert!(telegram.received_at >= before && telegram.received_at <= after);
    }

    #[test]
    fn test_serialization_skips_absent_registers() {
        let telegram = decode(TELEGRAM_GAS).unwrap();
        let json = serde_json::to_value(&telegram).unwrap();
        let object = json.as_object().unwrap();

        assert!(object.contains_key("gas"));
        assert!(object.contains_key("electricity_received_tariff1"));
        // nothing in the record fed these
        assert!(!object.contains_key("water"));
        assert!(!object.contains_key("voltage_l1"));
        assert!(!object.contains_key("message"));
    }
}
