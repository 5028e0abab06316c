//! Per-phase staging of record updates and deletes
//!
//! Provides [`StagingSet`], the transactional holding area an upgrade phase
//! writes into. Nothing staged is visible outside the phase until the
//! orchestrator commits it.

use crate::record::{Record, RecordId};
use indexmap::IndexMap;

/// Pending updates and deletes of one phase
///
/// # Invariants
/// - An id is never pending as both update and delete
/// - Staging the same id twice replaces the prior value
#[derive(Debug, Clone, Default)]
pub struct StagingSet {
    updates: IndexMap<RecordId, Record>,
    deletes: IndexMap<RecordId, Record>,
}

impl StagingSet {
    /// Create empty staging set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a replacement (or new) record
    ///
    /// Withdraws any pending delete for the same id.
    pub fn stage_update(&mut self, record: Record) {
        let id = record.id();
        self.deletes.shift_remove(&id);
        self.updates.insert(id, record);
    }

    /// Stage removal of a record
    ///
    /// Withdraws any pending update for the same id.
    pub fn stage_delete(&mut self, record: Record) {
        let id = record.id();
        self.updates.shift_remove(&id);
        self.deletes.insert(id, record);
    }

    /// Withdraw a pending update, returning it
    pub fn unstage_update(&mut self, id: RecordId) -> Option<Record> {
        self.updates.shift_remove(&id)
    }

    /// Pending update for an id
    #[inline]
    #[must_use]
    pub fn staged_update(&self, id: RecordId) -> Option<&Record> {
        self.updates.get(&id)
    }

    /// Whether an update is pending for an id
    #[inline]
    #[must_use]
    pub fn has_update(&self, id: RecordId) -> bool {
        self.updates.contains_key(&id)
    }

    /// Whether a delete is pending for an id
    #[inline]
    #[must_use]
    pub fn has_delete(&self, id: RecordId) -> bool {
        self.deletes.contains_key(&id)
    }

    /// Pending updates in staging order
    #[inline]
    pub fn updates(&self) -> impl Iterator<Item = &Record> {
        self.updates.values()
    }

    /// Pending deletes in staging order
    #[inline]
    pub fn deletes(&self) -> impl Iterator<Item = &Record> {
        self.deletes.values()
    }

    /// Number of pending updates
    #[inline]
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.updates.len()
    }

    /// Number of pending deletes
    #[inline]
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.deletes.len()
    }

    /// Whether nothing is staged
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Consume into `(updates, deletes)` in staging order
    #[must_use]
    pub fn into_parts(self) -> (Vec<Record>, Vec<Record>) {
        (
            self.updates.into_values().collect(),
            self.deletes.into_values().collect(),
        )
    }
}
