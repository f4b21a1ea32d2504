//! Attachment unpacker: scans turn files, tracks the turn generation, and
//! filters and saves the attachments it found.
//!
//! Typical flow:
//!
//! 1. [`Unpacker::load_directory`] for every player of interest;
//! 2. [`policy::check_new_attachments`] to pre-select by kind and learn
//!    whether the user needs to be asked;
//! 3. optional user edits via the `select_*` methods;
//! 4. [`Unpacker::drop_unchanged_files`] and [`Unpacker::save_files`];
//! 5. [`policy::mark_attachments_processed`].

pub mod policy;

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Result, UnpackError};
use crate::export::attachment::{file_matches, save_attachment};
use crate::model::attachment::{Attachment, AttachmentId, AttachmentKind, KindSet};
use crate::model::timestamp::Timestamp;
use crate::parser::notes::NotesReader;
use crate::parser::result::{self, ResultHeader};
use crate::parser::util::UtilDataReader;
use crate::store::attachments::AttachmentStore;

/// Owns one attachment store and the timestamp of the turn it belongs to.
#[derive(Debug, Default)]
pub struct Unpacker {
    store: AttachmentStore,
    timestamp: Option<Timestamp>,
}

impl Unpacker {
    /// Create an unpacker with the default acceptable kinds (all but critical files).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unpacker with an explicit default selection policy.
    pub fn with_acceptable_kinds(kinds: KindSet) -> Self {
        Self {
            store: AttachmentStore::new(kinds),
            timestamp: None,
        }
    }

    /// Set whether attachments of `kind` found from now on start out selected.
    pub fn set_acceptable_kind(&mut self, kind: AttachmentKind, enable: bool) {
        self.store.set_acceptable_kind(kind, enable);
    }

    // ── Scanning ────────────────────────────────────────────────

    /// Scan `player<N>.rst` and `util<N>.dat` in `dir`.
    ///
    /// Missing files are skipped. Errors in one file are logged and do not
    /// prevent the other one from being scanned.
    pub fn load_directory(&mut self, dir: &Path, player: u16) {
        if let Some(path) = find_file(dir, &format!("player{player}.rst")) {
            if let Err(e) = self.load_result_path(&path, player) {
                warn!(path = %path.display(), error = %e, "Could not scan result file");
            }
        }
        if let Some(path) = find_file(dir, &format!("util{player}.dat")) {
            if let Err(e) = self.load_util_path(&path, player) {
                warn!(path = %path.display(), error = %e, "Could not scan util data");
            }
        }
    }

    fn load_result_path(&mut self, path: &Path, player: u16) -> Result<()> {
        let file = File::open(path).map_err(|e| UnpackError::io(path, e))?;
        debug!(path = %path.display(), "Scanning result file");
        self.load_result_file(BufReader::new(file), player)
    }

    fn load_util_path(&mut self, path: &Path, player: u16) -> Result<()> {
        let file = File::open(path).map_err(|e| UnpackError::io(path, e))?;
        debug!(path = %path.display(), "Scanning util data");
        self.load_util_data(BufReader::new(file), player)
    }

    /// Scan a result file for the race-name table and leech data.
    ///
    /// All sections are read before the store is touched, so a file that
    /// fails anywhere contributes nothing.
    pub fn load_result_file<R: Read + Seek>(&mut self, mut reader: R, player: u16) -> Result<()> {
        let header = ResultHeader::read(&mut reader)?;
        let timestamp = result::read_timestamp(&mut reader, &header)?;
        let race_names = result::read_race_names(&mut reader, &header)?;
        let leech = result::read_leech(&mut reader, &header)?;

        if !self.accept_timestamp(timestamp) {
            return Ok(());
        }
        if let Some(names) = race_names {
            self.store.add_file("race.nm", names);
        }
        if let Some(leech) = leech {
            self.store.add_file(&format!("leech{player}.dat"), leech);
        }
        Ok(())
    }

    /// Scan a util-data file for embedded files.
    pub fn load_util_data<R: Read>(&mut self, reader: R, player: u16) -> Result<()> {
        let mut util = UtilDataReader::new(reader);
        let control = util.read_control()?;
        if let Some(found) = control.player {
            if found != player {
                return Err(UnpackError::InvalidUtilData(format!(
                    "file belongs to player {found}, expected {player}"
                )));
            }
        }
        if !self.accept_timestamp(control.timestamp) {
            return Ok(());
        }

        let mut notes = NotesReader::new(&mut self.store);
        let outcome = loop {
            match util.next_record() {
                Ok(Some((record_id, data))) => notes.add_record(record_id, &data),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        notes.finish();
        outcome
    }

    /// Apply the generation rule for a newly scanned source.
    ///
    /// Returns `false` if the source must be skipped. A newer timestamp
    /// discards everything collected so far.
    fn accept_timestamp(&mut self, timestamp: Option<Timestamp>) -> bool {
        let Some(timestamp) = timestamp else {
            warn!("Source has an invalid timestamp, skipping");
            return false;
        };
        match self.timestamp {
            Some(current) if timestamp < current => {
                info!(
                    found = %timestamp,
                    current = %current,
                    "Source is older than current turn, skipping"
                );
                false
            }
            Some(current) if timestamp == current => true,
            _ => {
                if !self.store.is_empty() {
                    info!(
                        timestamp = %timestamp,
                        "Newer turn found, discarding previous attachments"
                    );
                }
                self.store.clear();
                self.timestamp = Some(timestamp);
                true
            }
        }
    }

    // ── Post-processing ─────────────────────────────────────────

    /// Remove attachments whose content already exists, byte for byte, in `dir`.
    pub fn drop_unchanged_files(&mut self, dir: &Path) {
        self.store.retain(|a| {
            let unchanged = file_matches(&dir.join(a.name()), a.content());
            if unchanged {
                debug!(name = %a.name(), "File is unchanged, dropping");
            }
            !unchanged
        });
    }

    /// Remove every attachment that is not selected.
    pub fn drop_unselected_attachments(&mut self) {
        self.store.retain(Attachment::is_enabled);
    }

    /// Write every selected attachment into `dir`.
    ///
    /// Failures are logged per file and do not stop the remaining files.
    /// Returns `true` only if every selected attachment was written.
    pub fn save_files(&self, dir: &Path) -> bool {
        let mut ok = true;
        for a in self.store.iter().filter(|a| a.is_enabled()) {
            match save_attachment(dir, a) {
                Ok(()) => info!(name = %a.name(), size = a.size(), "Saved attachment"),
                Err(e) => {
                    warn!(name = %a.name(), error = %e, "Could not save attachment");
                    ok = false;
                }
            }
        }
        ok
    }

    // ── Inspection ──────────────────────────────────────────────

    pub fn num_attachments(&self) -> usize {
        self.store.len()
    }

    /// Iterate attachments in listing order.
    pub fn attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.store.iter()
    }

    pub fn attachment_by_index(&self, index: usize) -> Option<AttachmentId> {
        self.store.at(index).map(Attachment::id)
    }

    pub fn attachment_by_name(&self, name: &str) -> Option<AttachmentId> {
        self.store.find(name).map(Attachment::id)
    }

    pub fn attachment(&self, id: AttachmentId) -> Option<&Attachment> {
        self.store.get(id)
    }

    pub fn attachment_kind(&self, id: AttachmentId) -> Option<AttachmentKind> {
        self.store.get(id).map(Attachment::kind)
    }

    pub fn attachment_name(&self, id: AttachmentId) -> Option<&str> {
        self.store.get(id).map(Attachment::name)
    }

    pub fn attachment_size(&self, id: AttachmentId) -> Option<usize> {
        self.store.get(id).map(Attachment::size)
    }

    /// `false` for unknown handles.
    pub fn is_attachment_selected(&self, id: AttachmentId) -> bool {
        self.store.get(id).is_some_and(Attachment::is_enabled)
    }

    /// Kinds of all attachments currently present.
    pub fn all_attachment_kinds(&self) -> KindSet {
        self.store.kinds_present()
    }

    /// Timestamp of the turn the attachments belong to.
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }

    // ── Selection ───────────────────────────────────────────────

    pub fn select_attachment(&mut self, id: AttachmentId, enable: bool) {
        self.store.select(id, enable);
    }

    pub fn select_attachments_by_kind(&mut self, kind: AttachmentKind, enable: bool) {
        self.store.select_kind(kind, enable);
    }

    pub fn select_all_attachments(&mut self, enable: bool) {
        self.store.select_all(enable);
    }
}

/// Find `name` in `dir`, exactly or else ignoring ASCII case.
fn find_file(dir: &Path, name: &str) -> Option<PathBuf> {
    let exact = dir.join(name);
    if exact.is_file() {
        return Some(exact);
    }
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .find(|e| e.file_name().to_string_lossy().eq_ignore_ascii_case(name))
        .map(|e| e.path())
        .filter(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn util_file(timestamp: &[u8; 18], player: u16, records: &[(u16, Vec<u8>)]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut control = timestamp.to_vec();
        control.extend_from_slice(&1u16.to_le_bytes());
        control.extend_from_slice(&player.to_le_bytes());
        for (id, data) in std::iter::once(&(13u16, control)).chain(records) {
            out.extend_from_slice(&id.to_le_bytes());
            out.extend_from_slice(&(data.len() as u16).to_le_bytes());
            out.extend_from_slice(data);
        }
        out
    }

    fn file_record(name: &str, content: &[u8]) -> (u16, Vec<u8>) {
        let mut data = vec![0u8; 12];
        data[..name.len()].copy_from_slice(name.as_bytes());
        data.extend_from_slice(content);
        (34, data)
    }

    const OLD: &[u8; 18] = b"01-01-200700:00:00";
    const NEW: &[u8; 18] = b"01-02-200700:00:00";

    #[test]
    fn test_same_generation_merges() {
        let mut u = Unpacker::new();
        u.load_util_data(Cursor::new(util_file(OLD, 1, &[file_record("a.txt", b"a")])), 1)
            .unwrap();
        u.load_util_data(Cursor::new(util_file(OLD, 2, &[file_record("b.txt", b"b")])), 2)
            .unwrap();
        assert_eq!(u.num_attachments(), 2);
    }

    #[test]
    fn test_newer_generation_replaces() {
        let mut u = Unpacker::new();
        u.load_util_data(Cursor::new(util_file(OLD, 1, &[file_record("a.txt", b"a")])), 1)
            .unwrap();
        u.load_util_data(Cursor::new(util_file(NEW, 1, &[file_record("b.txt", b"b")])), 1)
            .unwrap();
        assert_eq!(u.num_attachments(), 1);
        assert!(u.attachment_by_name("b.txt").is_some());
        assert_eq!(u.timestamp(), Timestamp::from_bytes(NEW));
    }

    #[test]
    fn test_older_generation_skipped() {
        let mut u = Unpacker::new();
        u.load_util_data(Cursor::new(util_file(NEW, 1, &[file_record("b.txt", b"b")])), 1)
            .unwrap();
        u.load_util_data(Cursor::new(util_file(OLD, 1, &[file_record("a.txt", b"a")])), 1)
            .unwrap();
        assert_eq!(u.num_attachments(), 1);
        assert!(u.attachment_by_name("a.txt").is_none());
        assert_eq!(u.timestamp(), Timestamp::from_bytes(NEW));
    }

    #[test]
    fn test_invalid_timestamp_skipped() {
        let mut u = Unpacker::new();
        let bytes = util_file(b"xx-xx-xxxxxx:xx:xx", 1, &[file_record("a.txt", b"a")]);
        u.load_util_data(Cursor::new(bytes), 1).unwrap();
        assert_eq!(u.num_attachments(), 0);
        assert_eq!(u.timestamp(), None);
    }

    #[test]
    fn test_wrong_player_rejected() {
        let mut u = Unpacker::new();
        let bytes = util_file(OLD, 3, &[file_record("a.txt", b"a")]);
        let err = u.load_util_data(Cursor::new(bytes), 1).unwrap_err();
        assert!(err.is_format_error());
        assert_eq!(u.num_attachments(), 0);
    }

    #[test]
    fn test_accessors_and_selection() {
        let mut u = Unpacker::new();
        u.load_util_data(
            Cursor::new(util_file(
                OLD,
                1,
                &[file_record("file.txt", b"xy\n"), file_record("game.exe", b"MZ")],
            )),
            1,
        )
        .unwrap();

        let txt = u.attachment_by_index(1).unwrap();
        assert_eq!(u.attachment_name(txt), Some("file.txt"));
        assert_eq!(u.attachment_size(txt), Some(3));
        assert_eq!(u.attachment_kind(txt), Some(AttachmentKind::NormalFile));
        assert!(u.is_attachment_selected(txt));

        let exe = u.attachment_by_name("GAME.EXE").unwrap();
        assert!(!u.is_attachment_selected(exe));

        u.select_attachment(exe, true);
        assert!(u.is_attachment_selected(exe));
        u.select_attachments_by_kind(AttachmentKind::CriticalFile, false);
        assert!(!u.is_attachment_selected(exe));

        u.drop_unselected_attachments();
        assert_eq!(u.num_attachments(), 1);
        assert_eq!(u.attachment_name(exe), None);
        assert!(!u.is_attachment_selected(exe));
        assert_eq!(u.attachment_name(txt), Some("file.txt"));
    }

    #[test]
    fn test_explicit_acceptable_kinds() {
        let mut u = Unpacker::with_acceptable_kinds(KindSet::empty());
        u.set_acceptable_kind(AttachmentKind::ConfigurationFile, true);
        u.load_util_data(
            Cursor::new(util_file(
                OLD,
                1,
                &[file_record("pconfig.src", b"x"), file_record("a.txt", b"a")],
            )),
            1,
        )
        .unwrap();
        let cfg = u.attachment_by_name("pconfig.src").unwrap();
        let txt = u.attachment_by_name("a.txt").unwrap();
        assert!(u.is_attachment_selected(cfg));
        assert!(!u.is_attachment_selected(txt));
    }

    #[test]
    fn test_find_file_ignores_case() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("PLAYER3.RST"), b"x").unwrap();
        assert!(find_file(tmp.path(), "player3.rst").is_some());
        assert!(find_file(tmp.path(), "player4.rst").is_none());
    }
}
