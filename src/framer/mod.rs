//! Splits a continuous byte stream into telegram-sized records.
//!
//! A record ends with the checksum trailer: the `!` introducer, four hex
//! digits and a CRLF. The framer accumulates bytes from the underlying
//! source until that marker appears, hands out everything up to and
//! including it, and keeps the remainder for the next call. A single
//! read from the source may carry more than one record; the buffer is
//! drained before more bytes are requested.

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::bytes::Regex;
use std::io::Read;
use thiserror::Error;

/// Lower bound for the record size limit. Anything smaller would cut
/// off well-formed telegrams from multi-phase meters.
pub const MIN_RECORD_SIZE: usize = 2048;
/// Upper bound for the record size limit.
pub const MAX_RECORD_SIZE: usize = 1024 * 1024;
/// Default record size limit, roomy enough for every protocol revision.
pub const DEFAULT_MAX_RECORD_SIZE: usize = 20480;

const READ_CHUNK_SIZE: usize = 1024;

lazy_static! {
    // One unambiguous boundary per occurrence: introducer, exactly four
    // hex digits, CRLF.
    static ref END_OF_RECORD: Regex = Regex::new(r"![0-9A-Fa-f]{4}\r\n").unwrap();
}

#[derive(Error, Debug)]
pub enum FramerError {
    #[error("error reading from the telegram source: {0}")]
    Io(#[from] std::io::Error),
    #[error("no end-of-record marker within {limit} bytes, the stream is desynchronized")]
    MaxSizeExceeded { limit: usize },
}

/// Per-stream framer state. Each stream gets its own instance; the
/// framer holds the only mutable state in the decoding pipeline.
pub struct TelegramFramer<R: Read> {
    source: R,
    buffer: Vec<u8>,
    max_record_size: usize,
    at_eof: bool,
    tail_returned: bool,
}

impl<R: Read> TelegramFramer<R> {
    pub fn new(source: R) -> Self {
        Self::with_max_record_size(source, DEFAULT_MAX_RECORD_SIZE)
    }

    /// Creates a framer with a custom record size limit. The limit is
    /// clamped to [`MIN_RECORD_SIZE`]..=[`MAX_RECORD_SIZE`]: too small
    /// truncates valid records, too large defers desynchronization
    /// detection while the buffer grows without bound.
    pub fn with_max_record_size(source: R, max_record_size: usize) -> Self {
        let clamped = max_record_size.clamp(MIN_RECORD_SIZE, MAX_RECORD_SIZE);
        if clamped != max_record_size {
            warn!(
                "Record size limit {} outside [{}, {}], clamped to {}",
                max_record_size, MIN_RECORD_SIZE, MAX_RECORD_SIZE, clamped
            );
        }
        TelegramFramer {
            source,
            buffer: Vec::new(),
            max_record_size: clamped,
            at_eof: false,
            tail_returned: false,
        }
    }

    /// Returns the next record, or `Ok(None)` once the stream is
    /// exhausted. At end-of-stream whatever unterminated text remains is
    /// returned exactly once (it may be empty), so the record sequence
    /// is independent of how the source chunks its bytes.
    pub fn read(&mut self) -> Result<Option<String>, FramerError> {
        loop {
            let marker_end = END_OF_RECORD.find(&self.buffer).map(|found| found.end());
            if let Some(end) = marker_end {
                let remainder = self.buffer.split_off(end);
                let record = String::from_utf8_lossy(&self.buffer).into_owned();
                self.buffer = remainder;
                debug!("Framed a record of {} bytes", record.len());
                return Ok(Some(record));
            }

            if self.buffer.len() > self.max_record_size {
                return Err(FramerError::MaxSizeExceeded {
                    limit: self.max_record_size,
                });
            }

            if self.at_eof {
                if self.tail_returned {
                    return Ok(None);
                }
                self.tail_returned = true;
                let tail = String::from_utf8_lossy(&self.buffer).into_owned();
                self.buffer.clear();
                return Ok(Some(tail));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let n = self.source.read(&mut chunk)?;
            if n == 0 {
                self.at_eof = true;
            } else {
                self.buffer.extend_from_slice(&chunk[..n]);
            }
        }
    }
}
