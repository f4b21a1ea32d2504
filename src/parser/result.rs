//! Result file (`player<N>.rst`) sections used for unpacking.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ HEADER                                   │
//! │  addresses: [i32; 8]  (1-based offsets)  │
//! │    ships, targets, planets, bases,       │
//! │    messages, ship-xy, gen, vcr           │
//! │  signature: [u8; 8] = b"VER3.5nn"        │  optional
//! │  kore address: i32                       │  with signature
//! │  leech address: i32                      │  with signature, nn >= 1
//! ├──────────────────────────────────────────┤
//! │ GEN section: timestamp [u8; 18] | ...    │
//! │ KORE section:                            │
//! │  minefields [8; 500] | storms [12; 50]   │
//! │  | explosions [4; 50] | race names [682] │
//! │ LEECH section: size: u32 | data          │
//! └──────────────────────────────────────────┘
//! ```

use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::debug;

use crate::error::{Result, UnpackError};
use crate::model::timestamp::{Timestamp, TIMESTAMP_SIZE};

/// Number of classic sections addressed by the header.
pub const NUM_SECTIONS: usize = 8;

/// Index of the GEN section in the header's address table.
pub const GEN_SECTION: usize = 6;

/// Signature prefix announcing the extended (Winplan) header.
pub const SIGNATURE_PREFIX: &[u8; 6] = b"VER3.5";

/// Offset of the race-name table within the KORE section.
pub const KORE_RACE_NAME_OFFSET: u64 = 500 * 8 + 50 * 12 + 50 * 4;

/// Size of the race-name table.
pub const RACE_NAME_SIZE: usize = 11 * 30 + 11 * 20 + 11 * 12;

/// Parsed result file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultHeader {
    addresses: [i32; NUM_SECTIONS],
    sub_version: Option<u8>,
    kore_address: i32,
    leech_address: i32,
    file_size: u64,
}

impl ResultHeader {
    /// Read the header from the start of the stream.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let mut addresses = [0i32; NUM_SECTIONS];
        for address in &mut addresses {
            *address = reader
                .read_i32::<LittleEndian>()
                .map_err(|_| UnpackError::InvalidResult("file too short for header".into()))?;
        }

        let mut header = Self {
            addresses,
            sub_version: None,
            kore_address: 0,
            leech_address: 0,
            file_size,
        };

        let mut extension = [0u8; 16];
        if reader.read_exact(&mut extension).is_ok() {
            if let Some(sub_version) = parse_signature(&extension[..8]) {
                header.sub_version = Some(sub_version);
                header.kore_address = i32::from_le_bytes([
                    extension[8],
                    extension[9],
                    extension[10],
                    extension[11],
                ]);
                header.leech_address = i32::from_le_bytes([
                    extension[12],
                    extension[13],
                    extension[14],
                    extension[15],
                ]);
            }
        }

        Ok(header)
    }

    /// Sub-version from a `VER3.5nn` signature, if the file has one.
    pub fn sub_version(&self) -> Option<u8> {
        self.sub_version
    }

    /// File position of a classic section.
    pub fn section_position(&self, index: usize) -> Option<u64> {
        self.addresses
            .get(index)
            .and_then(|&a| self.position(a))
    }

    /// File position of the KORE section.
    pub fn kore_position(&self) -> Option<u64> {
        self.sub_version.and_then(|_| self.position(self.kore_address))
    }

    /// File position of the LEECH section (sub-version 1 and later).
    pub fn leech_position(&self) -> Option<u64> {
        match self.sub_version {
            Some(v) if v >= 1 => self.position(self.leech_address),
            _ => None,
        }
    }

    fn position(&self, address: i32) -> Option<u64> {
        let address = u64::try_from(address).ok()?;
        (address >= 1 && address <= self.file_size).then(|| address - 1)
    }
}

fn parse_signature(sig: &[u8]) -> Option<u8> {
    if sig.len() != 8 || &sig[..6] != SIGNATURE_PREFIX {
        return None;
    }
    if !sig[6].is_ascii_digit() || !sig[7].is_ascii_digit() {
        return None;
    }
    Some((sig[6] - b'0') * 10 + (sig[7] - b'0'))
}

/// Read the turn timestamp from the GEN section.
///
/// A missing GEN section is a format error; a GEN section holding garbage
/// yields `Ok(None)` (an invalid timestamp).
pub fn read_timestamp<R: Read + Seek>(
    reader: &mut R,
    header: &ResultHeader,
) -> Result<Option<Timestamp>> {
    let pos = header
        .section_position(GEN_SECTION)
        .ok_or_else(|| UnpackError::InvalidResult("GEN section address out of range".into()))?;
    reader.seek(SeekFrom::Start(pos))?;
    let mut raw = [0u8; TIMESTAMP_SIZE];
    reader
        .read_exact(&mut raw)
        .map_err(|_| UnpackError::InvalidResult("GEN section truncated".into()))?;
    Ok(Timestamp::from_bytes(&raw))
}

/// Read the race-name table from the KORE section.
///
/// Returns `Ok(None)` if the file has no KORE section or the table is all
/// blanks; some hosts write such a table, and it must not replace real names.
pub fn read_race_names<R: Read + Seek>(
    reader: &mut R,
    header: &ResultHeader,
) -> Result<Option<Vec<u8>>> {
    let Some(kore) = header.kore_position() else {
        return Ok(None);
    };
    reader.seek(SeekFrom::Start(kore + KORE_RACE_NAME_OFFSET))?;
    let mut table = vec![0u8; RACE_NAME_SIZE];
    reader
        .read_exact(&mut table)
        .map_err(|_| UnpackError::InvalidResult("KORE section truncated".into()))?;

    if table.iter().any(|&b| b > b' ') {
        Ok(Some(table))
    } else {
        debug!("Race-name table is blank, ignoring");
        Ok(None)
    }
}

/// Read the LEECH section payload, if present.
pub fn read_leech<R: Read + Seek>(
    reader: &mut R,
    header: &ResultHeader,
) -> Result<Option<Vec<u8>>> {
    let Some(pos) = header.leech_position() else {
        return Ok(None);
    };
    reader.seek(SeekFrom::Start(pos))?;
    let declared = reader
        .read_u32::<LittleEndian>()
        .map_err(|_| UnpackError::InvalidResult("LEECH section truncated".into()))?;
    let size = usize::try_from(declared).map_err(|_| UnpackError::SectionTooLarge {
        section: "leech",
        size: u64::from(declared),
    })?;

    let available = header.file_size.saturating_sub(pos + 4);
    if u64::from(declared) > available {
        return Err(UnpackError::InvalidResult(format!(
            "LEECH section declares {declared} bytes, only {available} available"
        )));
    }

    let mut data = vec![0u8; size];
    reader
        .read_exact(&mut data)
        .map_err(|_| UnpackError::InvalidResult("LEECH section truncated".into()))?;
    Ok(Some(data))
}
