//! Shared helpers for OBIS-coded telegram lines.
//!
//! An OBIS reference is the dotted identifier in front of every body
//! line, `A-B:C.D.E` with an optional storage group that the P1 format
//! never uses. The value groups behind it come in a handful of grammars:
//! empty, hex-encoded text, a bare count, a decimal with a unit suffix,
//! or a compact timestamp.

/// Numeric form of an OBIS reference.
///
/// `a` names the medium (0 abstract, 1 electricity), `b` the channel —
/// 0 for the metering equipment itself, 1 and up for M-Bus slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObisRef {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
}

/// Parses `A-B:C.D.E` into its numeric form. A trailing `.F` or `*F`
/// storage group is accepted and discarded.
pub fn parse_obis(code: &str) -> Option<ObisRef> {
    let (a, rest) = split_number(code, '-')?;
    let (b, rest) = split_number(rest, ':')?;
    let (c, rest) = split_number(rest, '.')?;
    let (d, rest) = split_number(rest, '.')?;
    let (e, rest) = take_number(rest)?;
    match rest.strip_prefix(['.', '*']) {
        Some(storage) => {
            let (_, tail) = take_number(storage)?;
            if !tail.is_empty() {
                return None;
            }
        }
        None if !rest.is_empty() => return None,
        None => {}
    }
    Some(ObisRef { a, b, c, d, e })
}

fn split_number(text: &str, sep: char) -> Option<(u8, &str)> {
    let (num, rest) = text.split_once(sep)?;
    Some((parse_u8(num)?, rest))
}

fn take_number(text: &str) -> Option<(u8, &str)> {
    let digits = text.bytes().take_while(|b| b.is_ascii_digit()).count();
    Some((parse_u8(&text[..digits])?, &text[digits..]))
}

fn parse_u8(text: &str) -> Option<u8> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Splits `(v1)(v2)...` into its groups. Returns `None` unless the text
/// is exactly a run of one or more parenthesized groups.
pub fn split_groups(text: &str) -> Option<Vec<&str>> {
    let mut groups = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let inner = rest.strip_prefix('(')?;
        let close = inner.find(')')?;
        groups.push(&inner[..close]);
        rest = &inner[close + 1..];
    }
    if groups.is_empty() {
        return None;
    }
    Some(groups)
}

/// Parses a `value*unit` group with an enforced unit, e.g.
/// `004436.791*kWh`. The unit must match exactly.
pub fn parse_unit_value(group: &str, unit: &str) -> Option<f64> {
    let (value, suffix) = group.split_once('*')?;
    if suffix != unit {
        return None;
    }
    parse_decimal(value)
}

/// Parses an integer `value*unit` group with an enforced unit, as used
/// for power failure durations (`0000000240*s`).
pub fn parse_unit_count(group: &str, unit: &str) -> Option<u64> {
    let (value, suffix) = group.split_once('*')?;
    if suffix != unit {
        return None;
    }
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Parses a `value*unit` group with an arbitrary unit, as delivered by
/// M-Bus reading lines where the unit is checked semantically later.
pub fn split_value_unit(group: &str) -> Option<(f64, String)> {
    let (value, unit) = group.split_once('*')?;
    if unit.is_empty() {
        return None;
    }
    Some((parse_decimal(value)?, unit.to_string()))
}

/// Parses a bare decimal count like `00004` or `0002`.
pub fn parse_count(group: &str) -> Option<u32> {
    if group.is_empty() || !group.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    group.parse().ok()
}

/// Decodes a hex-encoded text value into the string it spells.
pub fn parse_hex_text(group: &str) -> Option<String> {
    let bytes = hex::decode(group).ok()?;
    String::from_utf8(bytes).ok()
}

fn parse_decimal(value: &str) -> Option<f64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    value.parse().ok()
}

/// Human-readable register names, used for diagnostics only.
pub fn describe(code: &str) -> Option<&'static str> {
    let description = match code {
        "1-3:0.2.8" => "P1 version",
        "0-0:96.1.4" => "P1 version (Belgium)",
        "0-0:1.0.0" => "Clock",
        "0-0:96.1.1" => "Equipment identifier",
        "0-0:96.14.0" => "Tariff indicator",
        "1-0:1.8.1" => "Energy received (tariff 1)",
        "1-0:1.8.2" => "Energy received (tariff 2)",
        "1-0:2.8.1" => "Energy returned (tariff 1)",
        "1-0:2.8.2" => "Energy returned (tariff 2)",
        "1-0:1.7.0" => "Power received",
        "1-0:2.7.0" => "Power returned",
        "0-0:96.7.21" => "Power failures",
        "0-0:96.7.9" => "Long power failures",
        "1-0:99.97.0" => "Power failure event log",
        "1-0:32.32.0" => "Voltage sags (L1)",
        "1-0:52.32.0" => "Voltage sags (L2)",
        "1-0:72.32.0" => "Voltage sags (L3)",
        "1-0:32.36.0" => "Voltage swells (L1)",
        "1-0:52.36.0" => "Voltage swells (L2)",
        "1-0:72.36.0" => "Voltage swells (L3)",
        "1-0:32.7.0" => "Voltage (L1)",
        "1-0:52.7.0" => "Voltage (L2)",
        "1-0:72.7.0" => "Voltage (L3)",
        "1-0:31.7.0" => "Current (L1)",
        "1-0:51.7.0" => "Current (L2)",
        "1-0:71.7.0" => "Current (L3)",
        "1-0:21.7.0" => "Power received (L1)",
        "1-0:41.7.0" => "Power received (L2)",
        "1-0:61.7.0" => "Power received (L3)",
        "1-0:22.7.0" => "Power returned (L1)",
        "1-0:42.7.0" => "Power returned (L2)",
        "1-0:62.7.0" => "Power returned (L3)",
        "0-0:96.13.1" => "Message code",
        "0-0:96.13.0" => "Message",
        _ => return None,
    };
    Some(description)
}
