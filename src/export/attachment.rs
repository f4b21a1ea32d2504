//! Save attachments and detect files that are already up to date.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{Result, UnpackError};
use crate::model::attachment::Attachment;

/// Chunk size for comparing against files on disk.
const COMPARE_CHUNK_SIZE: usize = 4096;

/// `true` if `path` exists and holds exactly `content`.
///
/// The file is streamed in chunks. Any read error counts as "different".
pub fn file_matches(path: &Path, content: &[u8]) -> bool {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };

    let mut buf = [0u8; COMPARE_CHUNK_SIZE];
    let mut remaining = content;
    loop {
        let n = match file.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Read failed while comparing");
                return false;
            }
        };
        if n == 0 {
            return remaining.is_empty();
        }
        if n > remaining.len() || buf[..n] != remaining[..n] {
            return false;
        }
        remaining = &remaining[n..];
    }
}

/// Write one attachment into `dir`, replacing whatever entry had its name.
pub fn save_attachment(dir: &Path, attachment: &Attachment) -> Result<()> {
    let path = dir.join(attachment.name());

    // Unlink first so a symlink or special file at that name is replaced, not written through.
    match std::fs::remove_file(&path) {
        Ok(()) => debug!(path = %path.display(), "Removed existing file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => debug!(path = %path.display(), error = %e, "Could not remove existing file"),
    }

    let mut file = File::create(&path).map_err(|e| UnpackError::io(&path, e))?;
    file.write_all(attachment.content())
        .map_err(|e| UnpackError::io(&path, e))?;
    file.flush().map_err(|e| UnpackError::io(&path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::attachments::AttachmentStore;

    #[test]
    fn test_file_matches() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("f.txt");
        std::fs::write(&path, b"hello").unwrap();

        assert!(file_matches(&path, b"hello"));
        assert!(!file_matches(&path, b"hell"));
        assert!(!file_matches(&path, b"hello!"));
        assert!(!file_matches(&path, b"jello"));
        assert!(!file_matches(&tmp.path().join("missing"), b""));
    }

    #[test]
    fn test_file_matches_across_chunks() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("big.bin");
        let content: Vec<u8> = (0..3 * COMPARE_CHUNK_SIZE + 17).map(|i| i as u8).collect();
        std::fs::write(&path, &content).unwrap();
        assert!(file_matches(&path, &content));

        let mut changed = content.clone();
        *changed.last_mut().unwrap() ^= 1;
        assert!(!file_matches(&path, &changed));
    }

    #[test]
    fn test_directory_never_matches() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!file_matches(tmp.path(), b""));
    }

    #[test]
    fn test_save_replaces_existing() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("file.txt"), b"old content").unwrap();

        let mut store = AttachmentStore::default();
        let id = store.add_file("file.txt", b"new".to_vec()).unwrap();
        save_attachment(tmp.path(), store.get(id).unwrap()).unwrap();
        assert_eq!(std::fs::read(tmp.path().join("file.txt")).unwrap(), b"new");
    }

    #[cfg(unix)]
    #[test]
    fn test_save_does_not_write_through_symlink() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("target.txt");
        std::fs::write(&target, b"keep me").unwrap();
        std::os::unix::fs::symlink(&target, tmp.path().join("file.txt")).unwrap();

        let mut store = AttachmentStore::default();
        let id = store.add_file("file.txt", b"new".to_vec()).unwrap();
        save_attachment(tmp.path(), store.get(id).unwrap()).unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"keep me");
        assert_eq!(std::fs::read(tmp.path().join("file.txt")).unwrap(), b"new");
    }
}
