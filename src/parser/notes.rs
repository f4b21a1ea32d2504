//! Notes-stream reader: embedded files in util-data records.
//!
//! Three record types carry files:
//!
//! ```text
//! 27  configuration     payload = complete pconfig.src
//! 34  file              name: [u8; 12] | payload
//! 59  file part         pos: u32 | name_len: u16 | width: u16 | flags: u16
//!                       | name: [u8; name_len] | payload
//!                       flags bit 0 = not first part, bit 1 = not last part
//! ```
//!
//! Records of type 59 are reassembled in stream order. A multi-part file is
//! only handed to the store once its last part arrives. Nothing in this
//! module fails: broken records are logged and skipped.

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, warn};

use crate::parser::filename::{canonical_name, decode_name};
use crate::store::attachments::AttachmentStore;

/// Record carrying the player's configuration file.
pub const RECORD_CONFIGURATION: u16 = 27;
/// Record carrying one complete file.
pub const RECORD_FILE: u16 = 34;
/// Record carrying one part of a file.
pub const RECORD_FILE_PART: u16 = 59;

/// Name given to the content of a configuration record.
pub const CONFIGURATION_FILE_NAME: &str = "pconfig.src";

const FILE_NAME_SIZE: usize = 12;
const PART_HEADER_SIZE: usize = 10;
const FLAG_NOT_FIRST: u16 = 0x0001;
const FLAG_NOT_LAST: u16 = 0x0002;

/// A decoded record of interest.
#[derive(Debug, PartialEq, Eq)]
pub enum NoteRecord<'a> {
    Configuration(&'a [u8]),
    File {
        name: String,
        content: &'a [u8],
    },
    FilePart {
        name: String,
        first: bool,
        last: bool,
        content: &'a [u8],
    },
    /// Any record type this reader does not care about.
    Ignored(u16),
}

impl<'a> NoteRecord<'a> {
    /// Decode one record. Errors describe why the record is unusable.
    pub fn parse(record_id: u16, data: &'a [u8]) -> Result<Self, String> {
        match record_id {
            RECORD_CONFIGURATION => Ok(NoteRecord::Configuration(data)),
            RECORD_FILE => {
                if data.len() < FILE_NAME_SIZE {
                    return Err(format!("file record too short ({} bytes)", data.len()));
                }
                let (name, content) = data.split_at(FILE_NAME_SIZE);
                Ok(NoteRecord::File {
                    name: decode_name(name),
                    content,
                })
            }
            RECORD_FILE_PART => {
                if data.len() < PART_HEADER_SIZE {
                    return Err(format!("file part record too short ({} bytes)", data.len()));
                }
                let name_len = usize::from(LittleEndian::read_u16(&data[4..6]));
                let flags = LittleEndian::read_u16(&data[8..10]);
                let rest = &data[PART_HEADER_SIZE..];
                if rest.len() < name_len {
                    return Err(format!(
                        "file part name length {name_len} exceeds record ({} bytes left)",
                        rest.len()
                    ));
                }
                let (name, content) = rest.split_at(name_len);
                Ok(NoteRecord::FilePart {
                    name: decode_name(name),
                    first: flags & FLAG_NOT_FIRST == 0,
                    last: flags & FLAG_NOT_LAST == 0,
                    content,
                })
            }
            other => Ok(NoteRecord::Ignored(other)),
        }
    }
}

/// A multi-part file still waiting for its last part.
#[derive(Debug)]
struct PendingFile {
    name: String,
    content: Vec<u8>,
}

/// Feeds notes-stream records into an [`AttachmentStore`].
///
/// Call [`NotesReader::finish`] after the last record so that an
/// unterminated multi-part file gets reported.
pub struct NotesReader<'s> {
    store: &'s mut AttachmentStore,
    pending: Option<PendingFile>,
}

impl<'s> NotesReader<'s> {
    pub fn new(store: &'s mut AttachmentStore) -> Self {
        Self {
            store,
            pending: None,
        }
    }

    /// Process one record.
    pub fn add_record(&mut self, record_id: u16, data: &[u8]) {
        let record = match NoteRecord::parse(record_id, data) {
            Ok(r) => r,
            Err(reason) => {
                warn!(record_id, reason = %reason, "Skipping malformed record");
                return;
            }
        };

        match record {
            NoteRecord::Configuration(content) => {
                self.store.add_file(CONFIGURATION_FILE_NAME, content.to_vec());
            }
            NoteRecord::File { name, content } => {
                self.store.add_file(&name, content.to_vec());
            }
            NoteRecord::FilePart {
                name,
                first,
                last,
                content,
            } => self.add_part(name, first, last, content),
            NoteRecord::Ignored(_) => {}
        }
    }

    fn add_part(&mut self, name: String, first: bool, last: bool, content: &[u8]) {
        if first {
            self.discard_pending();
            self.pending = Some(PendingFile {
                name,
                content: Vec::new(),
            });
        } else {
            match &self.pending {
                None => {
                    warn!(name = %name, "Continuation part without a starting part, ignoring");
                    return;
                }
                Some(p) if canonical_name(&p.name) != canonical_name(&name) => {
                    warn!(
                        expected = %p.name,
                        found = %name,
                        "Continuation part belongs to a different file, ignoring"
                    );
                    return;
                }
                Some(_) => {}
            }
        }

        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        pending.content.extend_from_slice(content);
        if last {
            if let Some(done) = self.pending.take() {
                debug!(
                    name = %done.name,
                    size = done.content.len(),
                    "Reassembled multi-part file"
                );
                self.store.add_file(&done.name, done.content);
            }
        }
    }

    fn discard_pending(&mut self) {
        if let Some(p) = self.pending.take() {
            warn!(name = %p.name, "Missing parts, file discarded");
        }
    }

    /// End of stream: an unterminated multi-part file is discarded.
    pub fn finish(mut self) {
        self.discard_pending();
    }
}
