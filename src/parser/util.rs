//! Util-data (`util<N>.dat`) record envelope.
//!
//! ```text
//! ┌───────────────────────────────┐
//! │ type: u16 │ size: u16 │ data  │  repeated until EOF
//! └───────────────────────────────┘
//! ```
//!
//! The first record is always the control record (type 13), which starts
//! with the 18-byte turn timestamp and, in files from any current host,
//! carries the player number at offset 20.

use std::io::{ErrorKind, Read};

use byteorder::{ByteOrder, LittleEndian};
use tracing::warn;

use crate::error::{Result, UnpackError};
use crate::model::timestamp::{Timestamp, TIMESTAMP_SIZE};

/// Type of the control record.
pub const RECORD_CONTROL: u16 = 13;

const RECORD_HEADER_SIZE: usize = 4;
const CONTROL_PLAYER_OFFSET: usize = 20;

/// Contents of the control record that matter for unpacking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRecord {
    /// Turn timestamp; `None` if the field does not hold a valid timestamp.
    pub timestamp: Option<Timestamp>,
    /// Player number, if the record is long enough to carry one.
    pub player: Option<u16>,
}

/// Sequential reader over util-data records.
pub struct UtilDataReader<R: Read> {
    reader: R,
    offset: u64,
}

impl<R: Read> UtilDataReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, offset: 0 }
    }

    /// Read and check the control record. Must be called first.
    pub fn read_control(&mut self) -> Result<ControlRecord> {
        let Some((record_id, data)) = self.next_record()? else {
            return Err(UnpackError::InvalidUtilData("file is empty".into()));
        };
        if record_id != RECORD_CONTROL {
            return Err(UnpackError::InvalidUtilData(format!(
                "first record has type {record_id}, expected {RECORD_CONTROL}"
            )));
        }
        if data.len() < TIMESTAMP_SIZE {
            return Err(UnpackError::InvalidUtilData(format!(
                "control record too short ({} bytes)",
                data.len()
            )));
        }
        let player = data
            .get(CONTROL_PLAYER_OFFSET..CONTROL_PLAYER_OFFSET + 2)
            .map(LittleEndian::read_u16);
        Ok(ControlRecord {
            timestamp: Timestamp::from_bytes(&data),
            player,
        })
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` at end of file. A record cut short by end of file
    /// also ends the stream (with a warning) rather than failing it.
    pub fn next_record(&mut self) -> Result<Option<(u16, Vec<u8>)>> {
        let mut header = [0u8; RECORD_HEADER_SIZE];
        let got = read_up_to(&mut self.reader, &mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got < RECORD_HEADER_SIZE {
            warn!(offset = self.offset, "Truncated record header at end of util data");
            return Ok(None);
        }

        let record_id = LittleEndian::read_u16(&header[0..2]);
        let size = LittleEndian::read_u16(&header[2..4]);
        let mut data = Vec::with_capacity(usize::from(size));
        (&mut self.reader)
            .take(u64::from(size))
            .read_to_end(&mut data)?;
        if data.len() < usize::from(size) {
            warn!(
                offset = self.offset,
                record_id,
                declared = size,
                available = data.len(),
                "Truncated record at end of util data"
            );
            return Ok(None);
        }

        self.offset += (RECORD_HEADER_SIZE + data.len()) as u64;
        Ok(Some((record_id, data)))
    }
}

/// Fill `buf` as far as the reader allows; returns the number of bytes read.
fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
