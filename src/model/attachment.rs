//! Attachment records and their classification.
//!
//! An attachment is a file that a host bundled into a player's turn data.
//! Its content is kept in memory until the caller decides whether to save it.

use serde::Serialize;

/// Security/role classification of an attachment, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttachmentKind {
    /// Anything not matched by a more specific rule.
    NormalFile,
    /// Host or client configuration (`pconfig.src`, `hconfig.hst`, ...).
    ConfigurationFile,
    /// The race-name table (`race.nm`).
    RaceNameFile,
    /// Executables and game-state files that must never be overwritten unattended.
    CriticalFile,
}

impl AttachmentKind {
    /// All kinds, in declaration order.
    pub const ALL: [AttachmentKind; 4] = [
        AttachmentKind::NormalFile,
        AttachmentKind::ConfigurationFile,
        AttachmentKind::RaceNameFile,
        AttachmentKind::CriticalFile,
    ];

    /// Short human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            AttachmentKind::NormalFile => "normal",
            AttachmentKind::ConfigurationFile => "configuration",
            AttachmentKind::RaceNameFile => "race names",
            AttachmentKind::CriticalFile => "critical",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// A small set of [`AttachmentKind`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindSet(u8);

impl KindSet {
    /// The empty set.
    pub fn empty() -> Self {
        Self(0)
    }

    /// Every kind.
    pub fn all() -> Self {
        AttachmentKind::ALL.into_iter().collect()
    }

    /// Default acceptable kinds: everything except critical files.
    pub fn default_acceptable() -> Self {
        Self::all().without(AttachmentKind::CriticalFile)
    }

    pub fn contains(self, kind: AttachmentKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn insert(&mut self, kind: AttachmentKind) {
        self.0 |= kind.bit();
    }

    pub fn remove(&mut self, kind: AttachmentKind) {
        self.0 &= !kind.bit();
    }

    /// Insert or remove `kind` depending on `enable`.
    pub fn set(&mut self, kind: AttachmentKind, enable: bool) {
        if enable {
            self.insert(kind);
        } else {
            self.remove(kind);
        }
    }

    /// Copy of this set with `kind` removed.
    pub fn without(mut self, kind: AttachmentKind) -> Self {
        self.remove(kind);
        self
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate the contained kinds in declaration order.
    pub fn iter(self) -> impl Iterator<Item = AttachmentKind> {
        AttachmentKind::ALL
            .into_iter()
            .filter(move |&k| self.contains(k))
    }
}

impl FromIterator<AttachmentKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = AttachmentKind>>(iter: I) -> Self {
        let mut set = KindSet::empty();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

/// Handle to an attachment inside one store.
///
/// Ids are never reused within a store, so a handle that outlives its
/// attachment simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttachmentId(pub(crate) u32);

/// One discovered file candidate.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub(crate) id: AttachmentId,
    name: String,
    kind: AttachmentKind,
    pub(crate) enabled: bool,
    pub(crate) content: Vec<u8>,
}

impl Attachment {
    /// Create an attachment. `name` must already be canonical.
    pub(crate) fn new(
        id: AttachmentId,
        name: String,
        kind: AttachmentKind,
        enabled: bool,
        content: Vec<u8>,
    ) -> Self {
        Self {
            id,
            name,
            kind,
            enabled,
            content,
        }
    }

    pub fn id(&self) -> AttachmentId {
        self.id
    }

    /// Canonical (trimmed, lower-case) file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AttachmentKind {
        self.kind
    }

    /// Whether the attachment is currently selected for saving.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_acceptable_excludes_critical() {
        let set = KindSet::default_acceptable();
        assert!(set.contains(AttachmentKind::NormalFile));
        assert!(set.contains(AttachmentKind::ConfigurationFile));
        assert!(set.contains(AttachmentKind::RaceNameFile));
        assert!(!set.contains(AttachmentKind::CriticalFile));
    }

    #[test]
    fn test_kind_set_mutation() {
        let mut set = KindSet::empty();
        assert!(set.is_empty());
        set.set(AttachmentKind::RaceNameFile, true);
        set.insert(AttachmentKind::CriticalFile);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![AttachmentKind::RaceNameFile, AttachmentKind::CriticalFile]
        );
        set.set(AttachmentKind::RaceNameFile, false);
        assert!(!set.contains(AttachmentKind::RaceNameFile));
        assert_eq!(set.without(AttachmentKind::CriticalFile), KindSet::empty());
    }
}
