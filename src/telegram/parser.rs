//! Line-level telegram grammar.
//!
//! Each body line is an OBIS reference followed by one or more
//! parenthesized value groups. Dispatch goes through a single match on
//! the numeric reference: known references carry an expected value
//! grammar, unknown ones are skipped so vendor extensions never break
//! parsing. A malformed known line downgrades the telegram instead of
//! aborting it; whatever else is recoverable still gets extracted.

use log::{debug, warn};
use thiserror::Error;

use super::structs::{MbusEvent, PowerFailureEvent, Telegram};
use crate::checksum;
use crate::obis_utils;
use crate::timestamp::parse_timestamp;

#[derive(Error, Debug)]
pub enum LineError {
    #[error("malformed OBIS reference")]
    BadReference,
    #[error("line has no value groups")]
    MissingGroups,
    #[error("wrong number of value groups")]
    WrongGroupCount,
    #[error("value does not match the expected grammar")]
    BadValue,
}

/// Parses one full telegram record into the raw field model. Syntax
/// problems are accumulated on the model's error flag; the caller
/// derives overall validity from it.
pub(crate) fn parse_telegram(raw: &str) -> Telegram {
    let mut telegram = Telegram::new();

    let mut lines = raw.lines();
    let ident_line = loop {
        match lines.next() {
            Some(line) if line.trim().is_empty() => continue,
            Some(line) => break line,
            None => {
                telegram.syntax_error = true;
                return telegram;
            }
        }
    };

    let ident = match ident_line.strip_prefix('/') {
        Some(ident) => ident,
        None => {
            // No identification means there is nothing trustworthy to
            // extract; report the failure and nothing else.
            warn!("Telegram does not start with an identification line");
            telegram.syntax_error = true;
            return telegram;
        }
    };

    telegram.ident = ident.to_string();
    let (brand_tag, device_id) = split_identification(ident);
    telegram.equipment_brand_tag = brand_tag;
    telegram.device_id = device_id;
    telegram.crc = checksum::extract(raw).map(str::to_string);

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with('!') {
            break;
        }
        if let Err(error) = parse_line(&mut telegram, line) {
            let reference = line.split('(').next().unwrap_or(line);
            match obis_utils::describe(reference) {
                Some(name) => warn!("Failed to parse {} line '{}': {}", name, line, error),
                None => warn!("Failed to parse line '{}': {}", line, error),
            }
            telegram.syntax_error = true;
        }
    }

    telegram
}

/// The identification reads `/XXXB\Mident`: a brand tag, a baud-rate
/// character, and the device identifier behind an optional `\`+mode
/// escape. `ISk5\2MT382-1000` splits into `ISK` and `MT382-1000`.
fn split_identification(ident: &str) -> (String, String) {
    let tag_len = ident
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .count();
    let tag = ident[..tag_len].to_uppercase();

    let mut rest = &ident[tag_len..];
    let mut chars = rest.chars();
    if chars.next().is_some() {
        rest = chars.as_str();
    }
    if let Some(stripped) = rest.strip_prefix('\\') {
        let mut chars = stripped.chars();
        rest = match chars.next() {
            Some(_) => chars.as_str(),
            None => stripped,
        };
    }

    (tag, rest.to_string())
}

fn parse_line(telegram: &mut Telegram, line: &str) -> Result<(), LineError> {
    let paren = line.find('(').ok_or(LineError::MissingGroups)?;
    let code = &line[..paren];
    let obis = obis_utils::parse_obis(code).ok_or(LineError::BadReference)?;
    let groups = obis_utils::split_groups(&line[paren..]).ok_or(LineError::BadValue)?;

    match (obis.a, obis.b, obis.c, obis.d, obis.e) {
        (1, 3, 0, 2, 8) => telegram.p1_version = Some(one(&groups)?.to_string()),
        (0, 0, 96, 1, 4) => telegram.p1_version_be = Some(one(&groups)?.to_string()),
        (0, 0, 1, 0, 0) => telegram.timestamp = Some(stamp(one(&groups)?)?),
        (0, 0, 96, 1, 1) => telegram.equipment_id = hex_text(one(&groups)?)?,
        (0, 0, 96, 14, 0) => telegram.tariff_indicator = Some(count(one(&groups)?)?),

        (1, 0, 1, 8, 1) => telegram.electricity_received_tariff1 = Some(kwh(one(&groups)?)?),
        (1, 0, 1, 8, 2) => telegram.electricity_received_tariff2 = Some(kwh(one(&groups)?)?),
        (1, 0, 2, 8, 1) => telegram.electricity_returned_tariff1 = Some(kwh(one(&groups)?)?),
        (1, 0, 2, 8, 2) => telegram.electricity_returned_tariff2 = Some(kwh(one(&groups)?)?),
        (1, 0, 1, 7, 0) => telegram.power_received = Some(kw(one(&groups)?)?),
        (1, 0, 2, 7, 0) => telegram.power_returned = Some(kw(one(&groups)?)?),

        (0, 0, 96, 7, 21) => telegram.power_failures = Some(count(one(&groups)?)?),
        (0, 0, 96, 7, 9) => telegram.long_power_failures = Some(count(one(&groups)?)?),
        (1, 0, 99, 97, 0) => parse_power_failure_log(telegram, &groups)?,

        (1, 0, 32, 32, 0) => telegram.voltage_sags_l1 = Some(count(one(&groups)?)?),
        (1, 0, 52, 32, 0) => telegram.voltage_sags_l2 = Some(count(one(&groups)?)?),
        (1, 0, 72, 32, 0) => telegram.voltage_sags_l3 = Some(count(one(&groups)?)?),
        (1, 0, 32, 36, 0) => telegram.voltage_swells_l1 = Some(count(one(&groups)?)?),
        (1, 0, 52, 36, 0) => telegram.voltage_swells_l2 = Some(count(one(&groups)?)?),
        (1, 0, 72, 36, 0) => telegram.voltage_swells_l3 = Some(count(one(&groups)?)?),

        (1, 0, 32, 7, 0) => telegram.voltage_l1 = Some(volt(one(&groups)?)?),
        (1, 0, 52, 7, 0) => telegram.voltage_l2 = Some(volt(one(&groups)?)?),
        (1, 0, 72, 7, 0) => telegram.voltage_l3 = Some(volt(one(&groups)?)?),
        (1, 0, 31, 7, 0) => telegram.current_l1 = Some(ampere(one(&groups)?)?),
        (1, 0, 51, 7, 0) => telegram.current_l2 = Some(ampere(one(&groups)?)?),
        (1, 0, 71, 7, 0) => telegram.current_l3 = Some(ampere(one(&groups)?)?),
        (1, 0, 21, 7, 0) => telegram.power_received_l1 = Some(kw(one(&groups)?)?),
        (1, 0, 41, 7, 0) => telegram.power_received_l2 = Some(kw(one(&groups)?)?),
        (1, 0, 61, 7, 0) => telegram.power_received_l3 = Some(kw(one(&groups)?)?),
        (1, 0, 22, 7, 0) => telegram.power_returned_l1 = Some(kw(one(&groups)?)?),
        (1, 0, 42, 7, 0) => telegram.power_returned_l2 = Some(kw(one(&groups)?)?),
        (1, 0, 62, 7, 0) => telegram.power_returned_l3 = Some(kw(one(&groups)?)?),

        (0, 0, 96, 13, 1) => telegram.message_code = hex_text(one(&groups)?)?,
        (0, 0, 96, 13, 0) => telegram.message = hex_text(one(&groups)?)?,

        (0, slot, 24, 1, 0) if slot >= 1 => {
            let device_type = count(one(&groups)?)?;
            mbus_event(telegram, slot).device_type = Some(device_type);
        }
        (0, slot, 96, 1, 0) if slot >= 1 => {
            let equipment_id = hex_text(one(&groups)?)?;
            mbus_event(telegram, slot).equipment_id = equipment_id;
        }
        (0, slot, 24, 2, 1) if slot >= 1 => {
            if groups.len() != 2 {
                return Err(LineError::WrongGroupCount);
            }
            let timestamp = stamp(groups[0])?;
            let (value, unit) =
                obis_utils::split_value_unit(groups[1]).ok_or(LineError::BadValue)?;
            let event = mbus_event(telegram, slot);
            event.timestamp = Some(timestamp);
            event.value = Some(value);
            event.unit = Some(unit);
        }

        _ => debug!("Ignoring unknown OBIS reference {}", code),
    }

    Ok(())
}

/// Log lines read `(count)(0-0:96.7.19)(end)(duration*s)...` with one
/// timestamp/duration pair per outage. The start time is derived, the
/// reported order is preserved.
fn parse_power_failure_log(telegram: &mut Telegram, groups: &[&str]) -> Result<(), LineError> {
    if groups.len() < 2 {
        return Err(LineError::WrongGroupCount);
    }
    let entries = obis_utils::parse_count(groups[0]).ok_or(LineError::BadValue)? as usize;
    if groups[1] != "0-0:96.7.19" {
        return Err(LineError::BadValue);
    }
    let pairs = &groups[2..];
    if pairs.len() != entries * 2 {
        return Err(LineError::WrongGroupCount);
    }

    for pair in pairs.chunks(2) {
        let end_time = stamp(pair[0])?;
        let duration_seconds = obis_utils::parse_unit_count(pair[1], "s").ok_or(LineError::BadValue)?;
        let start_time = chrono::Duration::try_seconds(duration_seconds as i64)
            .and_then(|duration| end_time.checked_sub_signed(duration));
        telegram.power_failure_log.push(PowerFailureEvent {
            start_time,
            end_time: Some(end_time),
            duration_seconds,
        });
    }

    Ok(())
}

fn mbus_event(telegram: &mut Telegram, slot: u8) -> &mut MbusEvent {
    telegram.mbus_events.entry(slot).or_default()
}

fn one<'a>(groups: &[&'a str]) -> Result<&'a str, LineError> {
    if groups.len() == 1 {
        Ok(groups[0])
    } else {
        Err(LineError::WrongGroupCount)
    }
}

fn stamp(group: &str) -> Result<chrono::DateTime<chrono::FixedOffset>, LineError> {
    parse_timestamp(group).ok_or(LineError::BadValue)
}

fn count(group: &str) -> Result<u32, LineError> {
    obis_utils::parse_count(group).ok_or(LineError::BadValue)
}

fn kwh(group: &str) -> Result<f64, LineError> {
    obis_utils::parse_unit_value(group, "kWh").ok_or(LineError::BadValue)
}

fn kw(group: &str) -> Result<f64, LineError> {
    obis_utils::parse_unit_value(group, "kW").ok_or(LineError::BadValue)
}

fn volt(group: &str) -> Result<f64, LineError> {
    obis_utils::parse_unit_value(group, "V").ok_or(LineError::BadValue)
}

fn ampere(group: &str) -> Result<f64, LineError> {
    obis_utils::parse_unit_value(group, "A").ok_or(LineError::BadValue)
}

/// Empty hex groups mean the register was transmitted without a value;
/// the field simply stays absent.
fn hex_text(group: &str) -> Result<Option<String>, LineError> {
    if group.is_empty() {
        return Ok(None);
    }
    obis_utils::parse_hex_text(group)
        .map(Some)
        .ok_or(LineError::BadValue)
}
