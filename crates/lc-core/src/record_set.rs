//! Ordered collections of collated entries.

use std::collections::{HashMap, HashSet};

use lc_common::CollatedEntry;

/// An ordered, append-only collection of [`CollatedEntry`] values.
///
/// The current artifact holds every version of every item ever seen for a
/// user; [`RecordSet::latest_per_identity`] reduces it to the authoritative
/// version of each item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    entries: Vec<CollatedEntry>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CollatedEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [CollatedEntry] {
        &mut self.entries
    }

    pub fn push(&mut self, entry: CollatedEntry) {
        self.entries.push(entry);
    }

    /// Append every entry of `other`, keeping its order.
    pub fn append(&mut self, other: RecordSet) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CollatedEntry> {
        self.entries.iter()
    }

    /// One entry per identity: the one with the greatest `last_update_time`.
    ///
    /// Ties go to the entry appended last. The result keeps the order in which
    /// identities first appear.
    pub fn latest_per_identity(&self) -> RecordSet {
        let mut slots: HashMap<&str, usize> = HashMap::with_capacity(self.entries.len());
        let mut latest: Vec<&CollatedEntry> = Vec::new();

        for entry in &self.entries {
            match slots.get(entry.identity_id.as_str()) {
                Some(&slot) => {
                    if latest[slot].last_update_time <= entry.last_update_time {
                        latest[slot] = entry;
                    }
                }
                None => {
                    slots.insert(entry.identity_id.as_str(), latest.len());
                    latest.push(entry);
                }
            }
        }

        RecordSet {
            entries: latest.into_iter().cloned().collect(),
        }
    }

    /// Content hashes of every entry.
    pub fn content_hashes(&self) -> HashSet<&str> {
        self.entries.iter().map(|e| e.content_hash.as_str()).collect()
    }

    /// Identity ids that have at least one tombstone.
    pub fn tombstoned_identities(&self) -> HashSet<&str> {
        tombstoned_identities(&self.entries)
    }

    /// Entries uploaded by `device_id`, in order.
    pub fn for_device<'a>(
        &'a self,
        device_id: &'a str,
    ) -> impl Iterator<Item = &'a CollatedEntry> + 'a {
        self.entries.iter().filter(move |e| e.device_id == device_id)
    }
}

/// Identity ids in `entries` that have at least one tombstone.
pub fn tombstoned_identities(entries: &[CollatedEntry]) -> HashSet<&str> {
    entries
        .iter()
        .filter(|e| e.is_deleted)
        .map(|e| e.identity_id.as_str())
        .collect()
}

impl From<Vec<CollatedEntry>> for RecordSet {
    fn from(entries: Vec<CollatedEntry>) -> Self {
        RecordSet { entries }
    }
}

impl FromIterator<CollatedEntry> for RecordSet {
    fn from_iter<I: IntoIterator<Item = CollatedEntry>>(iter: I) -> Self {
        RecordSet {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for RecordSet {
    type Item = CollatedEntry;
    type IntoIter = std::vec::IntoIter<CollatedEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a CollatedEntry;
    type IntoIter = std::slice::Iter<'a, CollatedEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
