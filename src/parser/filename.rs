//! Attachment file names: decoding, canonicalization, validation and classification.
//!
//! Names come from untrusted turn data and end up as paths in the user's game
//! directory, so anything that could escape that directory or is not portable
//! is rejected outright.

use std::cmp::Ordering;
use std::fmt;

use crate::model::attachment::AttachmentKind;

/// Why a name was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameProblem {
    Empty,
    LeadingDot,
    PathSeparator,
    NonAscii,
    ControlOrSpace,
}

impl fmt::Display for NameProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NameProblem::Empty => "name is empty",
            NameProblem::LeadingDot => "name starts with a dot",
            NameProblem::PathSeparator => "name contains a path separator",
            NameProblem::NonAscii => "name contains non-ASCII characters",
            NameProblem::ControlOrSpace => "name contains control characters or blanks",
        };
        f.write_str(text)
    }
}

/// Decode a name field from a game file.
///
/// The field ends at the first NUL byte; the text is Windows-1252, which is
/// what DOS and Windows hosts wrote.
pub fn decode_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let (text, _, _) = encoding_rs::WINDOWS_1252.decode(&field[..end]);
    text.into_owned()
}

/// Canonical form used as identity: surrounding ASCII whitespace trimmed, lower-cased.
///
/// Other whitespace (such as a decoded 0xA0) stays in place for [`check_name`] to reject.
pub fn canonical_name(name: &str) -> String {
    name.trim_matches(|c: char| c.is_ascii_whitespace()).to_lowercase()
}

/// Check a canonical name for safety.
pub fn check_name(name: &str) -> Result<(), NameProblem> {
    if name.is_empty() {
        return Err(NameProblem::Empty);
    }
    if name.starts_with('.') {
        return Err(NameProblem::LeadingDot);
    }
    for b in name.bytes() {
        match b {
            b'/' | b'\\' | b':' => return Err(NameProblem::PathSeparator),
            0x80..=0xFF => return Err(NameProblem::NonAscii),
            0x00..=0x20 => return Err(NameProblem::ControlOrSpace),
            _ => {}
        }
    }
    Ok(())
}

/// Listing order: case-insensitive, with a byte-wise tie break so the order is total.
pub fn collate(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    folded.then_with(|| a.cmp(b))
}

// ── Classification ──────────────────────────────────────────────

/// Ordered classification rules; the first match wins.
///
/// `*` matches any run of characters up to the next `.`,
/// `#` matches one or more decimal digits.
const KIND_RULES: &[(&str, AttachmentKind)] = &[
    // Programs
    ("*.exe", AttachmentKind::CriticalFile),
    ("*.com", AttachmentKind::CriticalFile),
    ("*.bat", AttachmentKind::CriticalFile),
    ("*.cmd", AttachmentKind::CriticalFile),
    ("*.dll", AttachmentKind::CriticalFile),
    ("*.ovl", AttachmentKind::CriticalFile),
    ("*.ovr", AttachmentKind::CriticalFile),
    ("*.pif", AttachmentKind::CriticalFile),
    ("*.scr", AttachmentKind::CriticalFile),
    ("*.vbs", AttachmentKind::CriticalFile),
    // Game state
    ("control.dat", AttachmentKind::CriticalFile),
    ("contrl#.dat", AttachmentKind::CriticalFile),
    ("init.tmp", AttachmentKind::CriticalFile),
    ("fizz.bin", AttachmentKind::CriticalFile),
    ("player#.rst", AttachmentKind::CriticalFile),
    ("player#.trn", AttachmentKind::CriticalFile),
    ("util#.dat", AttachmentKind::CriticalFile),
    ("ship#.dat", AttachmentKind::CriticalFile),
    ("shipxy#.dat", AttachmentKind::CriticalFile),
    ("pdata#.dat", AttachmentKind::CriticalFile),
    ("bdata#.dat", AttachmentKind::CriticalFile),
    ("mdata#.dat", AttachmentKind::CriticalFile),
    ("gen#.dat", AttachmentKind::CriticalFile),
    ("vcr#.dat", AttachmentKind::CriticalFile),
    ("mess#.dat", AttachmentKind::CriticalFile),
    ("mess3#.dat", AttachmentKind::CriticalFile),
    ("target#.dat", AttachmentKind::CriticalFile),
    ("kore#.dat", AttachmentKind::CriticalFile),
    ("skore#.dat", AttachmentKind::CriticalFile),
    ("*#.dis", AttachmentKind::CriticalFile),
    ("chart#.cc", AttachmentKind::CriticalFile),
    ("fleet#.cc", AttachmentKind::CriticalFile),
    ("team#.cc", AttachmentKind::CriticalFile),
    // Configuration and ship list
    ("*.src", AttachmentKind::ConfigurationFile),
    ("hconfig.hst", AttachmentKind::ConfigurationFile),
    ("shiplist.txt", AttachmentKind::ConfigurationFile),
    ("beamspec.dat", AttachmentKind::ConfigurationFile),
    ("torpspec.dat", AttachmentKind::ConfigurationFile),
    ("engspec.dat", AttachmentKind::ConfigurationFile),
    ("hullspec.dat", AttachmentKind::ConfigurationFile),
    ("truehull.dat", AttachmentKind::ConfigurationFile),
    // Race names
    ("race.nm", AttachmentKind::RaceNameFile),
];

/// Classify a canonical file name.
pub fn classify(name: &str) -> AttachmentKind {
    KIND_RULES
        .iter()
        .find(|(pattern, _)| pattern_matches(pattern.as_bytes(), name.as_bytes()))
        .map(|&(_, kind)| kind)
        .unwrap_or(AttachmentKind::NormalFile)
}

fn pattern_matches(pattern: &[u8], name: &[u8]) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some((b'*', rest)) => {
            let run = name.iter().take_while(|&&b| b != b'.').count();
            (0..=run).any(|n| pattern_matches(rest, &name[n..]))
        }
        Some((b'#', rest)) => {
            let run = name.iter().take_while(|b| b.is_ascii_digit()).count();
            (1..=run).any(|n| pattern_matches(rest, &name[n..]))
        }
        Some((&c, rest)) => match name.split_first() {
            Some((&first, tail)) if first == c => pattern_matches(rest, tail),
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("  Race.NM "), "race.nm");
        assert_eq!(canonical_name("FILE.TXT"), "file.txt");
    }

    #[test]
    fn test_canonical_name_keeps_non_breaking_space() {
        let name = canonical_name(&decode_name(b"race.nm\xA0"));
        assert_eq!(name, "race.nm\u{a0}");
        assert_eq!(check_name(&name), Err(NameProblem::NonAscii));
    }

    #[test]
    fn test_check_name_accepts_plain_names() {
        assert_eq!(check_name("file.txt"), Ok(()));
        assert_eq!(check_name("pconfig.src"), Ok(()));
        assert_eq!(check_name("a-b_c.d~"), Ok(()));
    }

    #[test]
    fn test_check_name_rejections() {
        assert_eq!(check_name(""), Err(NameProblem::Empty));
        assert_eq!(check_name(".profile"), Err(NameProblem::LeadingDot));
        assert_eq!(check_name("../x"), Err(NameProblem::LeadingDot));
        assert_eq!(check_name("a/b"), Err(NameProblem::PathSeparator));
        assert_eq!(check_name("a\\b"), Err(NameProblem::PathSeparator));
        assert_eq!(check_name("c:x"), Err(NameProblem::PathSeparator));
        assert_eq!(check_name("caf\u{e9}.txt"), Err(NameProblem::NonAscii));
        assert_eq!(check_name("a b"), Err(NameProblem::ControlOrSpace));
        assert_eq!(check_name("a\tb"), Err(NameProblem::ControlOrSpace));
    }

    #[test]
    fn test_decode_name_stops_at_nul() {
        assert_eq!(decode_name(b"file.txt\0\0\0\0"), "file.txt");
        assert_eq!(decode_name(b"race.nm     "), "race.nm     ");
        assert_eq!(decode_name(b"caf\xe9"), "caf\u{e9}");
    }

    #[test]
    fn test_classify_critical() {
        assert_eq!(classify("game.exe"), AttachmentKind::CriticalFile);
        assert_eq!(classify("ship3.dat"), AttachmentKind::CriticalFile);
        assert_eq!(classify("player11.rst"), AttachmentKind::CriticalFile);
        assert_eq!(classify("control.dat"), AttachmentKind::CriticalFile);
        assert_eq!(classify("pdata7.dis"), AttachmentKind::CriticalFile);
        assert_eq!(classify("autoexec.bat"), AttachmentKind::CriticalFile);
    }

    #[test]
    fn test_classify_other_kinds() {
        assert_eq!(classify("pconfig.src"), AttachmentKind::ConfigurationFile);
        assert_eq!(classify("hconfig.hst"), AttachmentKind::ConfigurationFile);
        assert_eq!(classify("race.nm"), AttachmentKind::RaceNameFile);
        assert_eq!(classify("file.txt"), AttachmentKind::NormalFile);
        assert_eq!(classify("leech3.dat"), AttachmentKind::NormalFile);
    }

    #[test]
    fn test_digit_placeholder_needs_digits() {
        assert_eq!(classify("ship.dat"), AttachmentKind::NormalFile);
        assert_eq!(classify("shipx.dat"), AttachmentKind::NormalFile);
        assert_eq!(classify("ship12x.dat"), AttachmentKind::NormalFile);
    }

    #[test]
    fn test_star_stops_at_dot() {
        assert!(pattern_matches(b"*.exe", b"game.exe"));
        assert!(!pattern_matches(b"*.exe", b"game.tar.exe"));
        assert!(!pattern_matches(b"*.exe", b"game.exe.txt"));
    }

    #[test]
    fn test_collate_case_insensitive() {
        assert_eq!(collate("B.txt", "a.txt"), Ordering::Greater);
        assert_eq!(collate("a.txt", "B.txt"), Ordering::Less);
        assert_eq!(collate("race.nm", "race.nm"), Ordering::Equal);
    }
}
