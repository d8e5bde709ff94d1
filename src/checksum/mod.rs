//! CRC-16 handling for the telegram trailer.
//!
//! The P1 trailer uses the ARC variant: reflected polynomial 0xA001,
//! initial value 0, no final XOR. The checksum covers every byte from the
//! leading `/` up to and including the `!` introducer, rendered as four
//! uppercase hex digits.

use crc16::{State, ARC};

/// Computes the CRC over a telegram body. The caller passes everything
/// from the leading `/` through the `!` introducer, inclusive.
pub fn compute(body: &str) -> u16 {
    State::<ARC>::calculate(body.as_bytes())
}

/// Renders a CRC value the way the meter prints it.
pub fn format_crc(crc: u16) -> String {
    format!("{:04X}", crc)
}

/// Returns the four checksum digits following the last `!`, or `None`
/// when the record carries no well-formed checksum field. The oldest
/// protocol revision has no checksum at all; that is a valid state, not
/// a failure.
pub fn extract(record: &str) -> Option<&str> {
    let bang = record.rfind('!')?;
    let digits = record.get(bang + 1..bang + 5)?;
    if digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(digits)
    } else {
        None
    }
}

/// Verifies the trailing checksum of a full record. Comparison is
/// case-sensitive: the meter prints uppercase. Empty, short, or non-hex
/// input yields `false`, never a panic.
pub fn is_valid(record: &str) -> bool {
    let bang = match record.rfind('!') {
        Some(i) => i,
        None => return false,
    };
    let digits = match record.get(bang + 1..bang + 5) {
        Some(d) => d,
        None => return false,
    };
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return false;
    }
    digits == format_crc(compute(&record[..=bang]))
}

/// Recomputes the checksum of a record and rewrites the trailer,
/// appending the `!` introducer when it is missing entirely. Used to
/// produce test fixtures from hand-edited telegrams.
pub fn repair(record: &str) -> String {
    let mut repaired = match record.rfind('!') {
        Some(bang) => record[..=bang].to_string(),
        None => {
            let mut body = record.trim_end_matches(['\r', '\n']).to_string();
            body.push_str("\r\n!");
            body
        }
    };
    let crc = compute(&repaired);
    repaired.push_str(&format_crc(crc));
    repaired.push_str("\r\n");
    repaired
}
