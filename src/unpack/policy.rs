//! Decision policy: combine persisted state with a freshly scanned unpacker.

use tracing::{debug, info};

use crate::config::{AcceptRaceNames, UnpackConfig};
use crate::model::attachment::AttachmentKind;
use crate::unpack::Unpacker;

/// Pre-select attachments by kind and decide whether the user must be asked.
///
/// Returns `true` if saving can proceed without asking:
/// - nothing was found;
/// - this exact turn was offered before (everything gets deselected);
/// - every kind present has been decided by policy.
///
/// Critical files are always deselected here. Race names follow
/// [`AcceptRaceNames`]; every other kind present leaves the decision to the user.
pub fn check_new_attachments(config: &UnpackConfig, unpacker: &mut Unpacker) -> bool {
    if unpacker.num_attachments() == 0 {
        return true;
    }

    if let Some(ts) = unpacker.timestamp() {
        if ts.to_string() == config.attachment_timestamp {
            debug!(timestamp = %ts, "Attachments already offered for this turn");
            unpacker.select_all_attachments(false);
            return true;
        }
    }

    let mut undecided = unpacker.all_attachment_kinds();

    unpacker.select_attachments_by_kind(AttachmentKind::CriticalFile, false);
    undecided.remove(AttachmentKind::CriticalFile);

    match config.accept_race_names {
        AcceptRaceNames::Accept => {
            unpacker.select_attachments_by_kind(AttachmentKind::RaceNameFile, true);
            undecided.remove(AttachmentKind::RaceNameFile);
        }
        AcceptRaceNames::Reject => {
            unpacker.select_attachments_by_kind(AttachmentKind::RaceNameFile, false);
            undecided.remove(AttachmentKind::RaceNameFile);
        }
        AcceptRaceNames::Ask => {}
    }

    undecided.is_empty()
}

/// Remember that this turn's attachments have been handled.
///
/// Call once after saving, whether or not anything was written.
pub fn mark_attachments_processed(config: &mut UnpackConfig, unpacker: &Unpacker) {
    if unpacker.num_attachments() == 0 {
        return;
    }
    if let Some(ts) = unpacker.timestamp() {
        info!(timestamp = %ts, "Marking attachments as processed");
        config.attachment_timestamp = ts.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn unpacker_with(names: &[&str]) -> Unpacker {
        let mut control = b"03-15-200712:00:05".to_vec();
        control.extend_from_slice(&[1, 0, 1, 0]);
        let mut bytes = Vec::new();
        let mut push = |id: u16, data: &[u8]| {
            bytes.extend_from_slice(&id.to_le_bytes());
            bytes.extend_from_slice(&(data.len() as u16).to_le_bytes());
            bytes.extend_from_slice(data);
        };
        push(13, &control);
        for name in names {
            let mut data = vec![0u8; 12];
            data[..name.len()].copy_from_slice(name.as_bytes());
            data.extend_from_slice(b"content");
            push(34, &data);
        }
        let mut u = Unpacker::new();
        u.load_util_data(Cursor::new(bytes), 1).unwrap();
        assert_eq!(u.num_attachments(), names.len());
        u
    }

    fn selected(u: &Unpacker, name: &str) -> bool {
        u.attachment_by_name(name)
            .map(|id| u.is_attachment_selected(id))
            .unwrap()
    }

    #[test]
    fn test_empty_store_proceeds() {
        let mut u = Unpacker::new();
        let mut cfg = UnpackConfig::default();
        assert!(check_new_attachments(&cfg, &mut u));
        mark_attachments_processed(&mut cfg, &u);
        assert_eq!(cfg.attachment_timestamp, "");
    }

    #[test]
    fn test_race_names_reject() {
        let mut u = unpacker_with(&["race.nm"]);
        let cfg = UnpackConfig {
            accept_race_names: AcceptRaceNames::Reject,
            ..Default::default()
        };
        assert!(check_new_attachments(&cfg, &mut u));
        assert!(!selected(&u, "race.nm"));
    }

    #[test]
    fn test_race_names_accept() {
        let mut u = unpacker_with(&["race.nm"]);
        u.select_attachments_by_kind(AttachmentKind::RaceNameFile, false);
        let cfg = UnpackConfig {
            accept_race_names: AcceptRaceNames::Accept,
            ..Default::default()
        };
        assert!(check_new_attachments(&cfg, &mut u));
        assert!(selected(&u, "race.nm"));
    }

    #[test]
    fn test_race_names_ask() {
        let mut u = unpacker_with(&["race.nm"]);
        let cfg = UnpackConfig::default();
        assert!(!check_new_attachments(&cfg, &mut u));
        // Left at the acceptable-kinds default.
        assert!(selected(&u, "race.nm"));
    }

    #[test]
    fn test_critical_files_always_deselected() {
        let mut u = unpacker_with(&["game.exe", "ship3.dat"]);
        u.select_all_attachments(true);
        let cfg = UnpackConfig::default();
        assert!(check_new_attachments(&cfg, &mut u));
        assert!(!selected(&u, "game.exe"));
        assert!(!selected(&u, "ship3.dat"));
    }

    #[test]
    fn test_normal_files_need_asking() {
        let mut u = unpacker_with(&["file.txt", "race.nm"]);
        let cfg = UnpackConfig {
            accept_race_names: AcceptRaceNames::Accept,
            ..Default::default()
        };
        assert!(!check_new_attachments(&cfg, &mut u));
        assert!(selected(&u, "file.txt"));
    }

    #[test]
    fn test_processed_turn_is_not_offered_again() {
        let mut u = unpacker_with(&["file.txt", "pconfig.src"]);
        let mut cfg = UnpackConfig::default();
        assert!(!check_new_attachments(&cfg, &mut u));
        mark_attachments_processed(&mut cfg, &u);
        assert_eq!(cfg.attachment_timestamp, "03-15-2007 12:00:05");

        assert!(check_new_attachments(&cfg, &mut u));
        assert!(u.attachments().all(|a| !a.is_enabled()));
    }
}
