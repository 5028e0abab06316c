//! Authoritative record collection owned by the upgrade orchestrator

use crate::category;
use crate::record::{Record, RecordId};
use crate::staging::StagingSet;
use indexmap::IndexMap;

/// Ordered id → record collection
///
/// Replacing a record keeps its position; new records append.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: IndexMap<RecordId, Record>,
}

impl RecordSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record, returning the previous one
    pub fn insert(&mut self, record: Record) -> Option<Record> {
        self.records.insert(record.id(), record)
    }

    /// Remove a record by id
    pub fn remove(&mut self, id: RecordId) -> Option<Record> {
        self.records.shift_remove(&id)
    }

    /// Look up by id
    #[inline]
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    /// Whether a record with this id exists
    #[inline]
    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.records.contains_key(&id)
    }

    /// Number of records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate records in set order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// First record of the root (virtual host) category
    #[must_use]
    pub fn root(&self) -> Option<&Record> {
        self.iter().find(|r| r.is_category(category::VIRTUAL_HOST))
    }

    /// Apply a committed staging set: deletes first, then updates
    pub fn apply(&mut self, staging: &StagingSet) {
        for record in staging.deletes() {
            self.records.shift_remove(&record.id());
        }
        for record in staging.updates() {
            self.records.insert(record.id(), record.clone());
        }
    }

    /// Consume into a record list in set order
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records.into_values().collect()
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().map(|r| (r.id(), r)).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = indexmap::map::Values<'a, RecordId, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.values()
    }
}
