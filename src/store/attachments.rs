//! Attachment store: an ordered, name-unique collection of discovered files.

use tracing::{debug, warn};

use crate::model::attachment::{Attachment, AttachmentId, AttachmentKind, KindSet};
use crate::parser::filename::{canonical_name, check_name, classify, collate};

/// Ordered collection of attachments, keyed by canonical name.
///
/// The store owns every [`Attachment`]; callers hold [`AttachmentId`]
/// handles. Entries are kept in collation order of their names at all times,
/// and at most one entry exists per canonical name.
#[derive(Debug)]
pub struct AttachmentStore {
    items: Vec<Attachment>,
    acceptable: KindSet,
    next_id: u32,
}

impl Default for AttachmentStore {
    fn default() -> Self {
        Self::new(KindSet::default_acceptable())
    }
}

impl AttachmentStore {
    /// Create an empty store. `acceptable` decides the initial selection of new attachments.
    pub fn new(acceptable: KindSet) -> Self {
        Self {
            items: Vec::new(),
            acceptable,
            next_id: 0,
        }
    }

    pub fn acceptable_kinds(&self) -> KindSet {
        self.acceptable
    }

    /// Change the default selection for attachments created from now on.
    pub fn set_acceptable_kind(&mut self, kind: AttachmentKind, enable: bool) {
        self.acceptable.set(kind, enable);
    }

    /// Add or replace a file.
    ///
    /// The name is canonicalized and validated; an unsafe name is logged and
    /// dropped. For a name already present, the content is replaced and the
    /// selection left alone. Returns the handle of the affected attachment.
    pub fn add_file(&mut self, name: &str, content: Vec<u8>) -> Option<AttachmentId> {
        let name = canonical_name(name);
        if let Err(problem) = check_name(&name) {
            warn!(name = %name, reason = %problem, "Ignoring attachment with invalid file name");
            return None;
        }

        match self
            .items
            .binary_search_by(|a| collate(a.name(), &name))
        {
            Ok(pos) => {
                let existing = &mut self.items[pos];
                debug!(name = %name, size = content.len(), "Replacing attachment content");
                existing.content = content;
                Some(existing.id)
            }
            Err(pos) => {
                let kind = classify(&name);
                let id = AttachmentId(self.next_id);
                self.next_id += 1;
                debug!(name = %name, kind = ?kind, size = content.len(), "New attachment");
                let enabled = self.acceptable.contains(kind);
                self.items
                    .insert(pos, Attachment::new(id, name, kind, enabled, content));
                Some(id)
            }
        }
    }

    /// Remove all attachments. Handles issued so far stop resolving.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate attachments in listing order.
    pub fn iter(&self) -> std::slice::Iter<'_, Attachment> {
        self.items.iter()
    }

    /// Attachment at a listing position.
    pub fn at(&self, index: usize) -> Option<&Attachment> {
        self.items.get(index)
    }

    /// Resolve a handle.
    pub fn get(&self, id: AttachmentId) -> Option<&Attachment> {
        self.items.iter().find(|a| a.id == id)
    }

    fn get_mut(&mut self, id: AttachmentId) -> Option<&mut Attachment> {
        self.items.iter_mut().find(|a| a.id == id)
    }

    /// Look up by name; the name is canonicalized first.
    pub fn find(&self, name: &str) -> Option<&Attachment> {
        let name = canonical_name(name);
        self.items
            .binary_search_by(|a| collate(a.name(), &name))
            .ok()
            .map(|pos| &self.items[pos])
    }

    /// Set of kinds of all attachments currently present.
    pub fn kinds_present(&self) -> KindSet {
        self.items.iter().map(Attachment::kind).collect()
    }

    /// Keep only the attachments for which `keep` returns `true`, preserving order.
    pub fn retain(&mut self, keep: impl FnMut(&Attachment) -> bool) {
        self.items.retain(keep);
    }

    /// Select or deselect one attachment. Unknown handles are ignored.
    pub fn select(&mut self, id: AttachmentId, enable: bool) {
        if let Some(a) = self.get_mut(id) {
            a.enabled = enable;
        }
    }

    /// Select or deselect every attachment of one kind.
    pub fn select_kind(&mut self, kind: AttachmentKind, enable: bool) {
        for a in self.items.iter_mut().filter(|a| a.kind() == kind) {
            a.enabled = enable;
        }
    }

    /// Select or deselect everything.
    pub fn select_all(&mut self, enable: bool) {
        for a in &mut self.items {
            a.enabled = enable;
        }
    }
}
